//! Named capability gates over the negotiated HAL interface version.

use crate::error::HalError;

/// An operation or field that needs at least `min_version` of the remote interface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capability {
    pub name: &'static str,
    pub min_version: i32,
}

impl Capability {
    pub const fn new(name: &'static str, min_version: i32) -> Self {
        Self { name, min_version }
    }

    pub fn supported_by(&self, negotiated: i32) -> bool {
        negotiated >= self.min_version
    }

    /// Fails with [`HalError::Unsupported`] when the negotiated version is too old.
    pub fn require(&self, method: &str, negotiated: i32) -> Result<(), HalError> {
        if self.supported_by(negotiated) {
            Ok(())
        } else {
            Err(HalError::unsupported(method, self.min_version, negotiated))
        }
    }
}

/// Versioned (AIDL) supplicant interface.
pub mod supplicant_aidl {
    use super::Capability;

    pub const EAPOL_IP_ADDRESS_ALLOCATION: Capability = Capability::new("eapol-ip-allocation", 2);
    pub const VENDOR_DATA: Capability = Capability::new("vendor-data", 3);
    pub const FIND_WITH_PARAMS: Capability = Capability::new("find-with-params", 3);
    pub const CONNECT_WITH_PARAMS: Capability = Capability::new("connect-with-params", 3);
    pub const EXT_LISTEN_WITH_PARAMS: Capability = Capability::new("ext-listen-with-params", 3);
    pub const PAIRING_BOOTSTRAPPING: Capability = Capability::new("pairing-bootstrapping", 4);
    pub const PROVISION_DISCOVERY_WITH_PARAMS: Capability =
        Capability::new("provision-discovery-with-params", 4);
    pub const CREATE_GROUP_OWNER: Capability = Capability::new("create-group-owner", 4);
    pub const ADD_GROUP_CONFIGURATION_PARAMS: Capability =
        Capability::new("add-group-configuration-params", 4);
    pub const REINVOKE_PERSISTENT_GROUP: Capability =
        Capability::new("reinvoke-persistent-group", 4);
    pub const FEATURE_SET: Capability = Capability::new("feature-set", 4);
    pub const KEY_MGMT_MASK: Capability = Capability::new("key-mgmt-mask", 4);
}

/// Legacy (HIDL) supplicant interface, gated on the 1.x minor version.
pub mod supplicant_hidl {
    use super::Capability;

    pub const ADD_INTERFACE: Capability = Capability::new("add-interface", 1);
    pub const TERMINATE: Capability = Capability::new("terminate", 1);
    pub const GROUP_ADD_WITH_CONFIG: Capability = Capability::new("group-add-with-config", 2);
    pub const MAC_RANDOMIZATION: Capability = Capability::new("mac-randomization", 2);
    pub const WFD_R2_DEVICE_INFO: Capability = Capability::new("wfd-r2-device-info", 4);
    pub const R2_CALLBACK: Capability = Capability::new("r2-callback", 4);
}

/// Versioned (AIDL) hostapd interface.
pub mod hostapd_aidl {
    use super::Capability;

    pub const VENDOR_DATA: Capability = Capability::new("vendor-data", 2);
    pub const DISCONNECT_REASON: Capability = Capability::new("disconnect-reason", 3);
    pub const CLIENT_ISOLATION: Capability = Capability::new("client-isolation", 3);
    pub const REMOVE_LINK: Capability = Capability::new("remove-link", 3);
}

/// Legacy (HIDL) hostapd interface.
pub mod hostapd_hidl {
    use super::Capability;

    pub const FAILURE_CALLBACK: Capability = Capability::new("failure-callback", 1);
    pub const FORCE_CLIENT_DISCONNECT: Capability = Capability::new("force-client-disconnect", 2);
    pub const DEBUG_PARAMS: Capability = Capability::new("debug-params", 2);
    pub const AP_INFO_CALLBACK: Capability = Capability::new("ap-info-callback", 3);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_compares_against_negotiated_version() {
        let cap = supplicant_aidl::CONNECT_WITH_PARAMS;
        assert!(!cap.supported_by(2));
        assert!(cap.supported_by(3));
        assert!(cap.supported_by(4));
    }

    #[test]
    fn require_reports_versions() {
        let err = supplicant_aidl::FEATURE_SET
            .require("getFeatureSet", 1)
            .expect_err("should be Unsupported");
        assert_eq!(err, HalError::unsupported("getFeatureSet", 4, 1));
    }
}
