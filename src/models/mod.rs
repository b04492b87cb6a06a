mod templates;

pub use templates::*;

/// Canonical raw template keys, as used by loaders and the legacy PHP fragments
pub mod template_key {
    pub const TYPE: &str = "type";
    pub const NAME: &str = "name";
    pub const ICON: &str = "icon";
    pub const NVRAM: &str = "nvram";
    pub const RAM: &str = "ram";
    pub const ETHERNET: &str = "ethernet";
    pub const SERIAL: &str = "serial";
}

/// Canonical websocket event type values
pub mod template_event {
    pub const RELOADED: &str = "templates_reloaded";
    pub const RELOAD_FAILED: &str = "reload_failed";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> DeviceTemplate {
        DeviceTemplate::from_parts(Backend::Iol, "R".into(), "Router.png".into(), 1024, 256, 1, 1)
    }

    #[test]
    fn test_backend_parse() {
        assert_eq!("iol".parse::<Backend>(), Ok(Backend::Iol));
        assert_eq!(" dynamips ".parse::<Backend>(), Ok(Backend::Dynamips));
        assert_eq!("qemu".parse::<Backend>(), Ok(Backend::Qemu));
        assert!("IOL".parse::<Backend>().is_err());
        assert!("vpcs".parse::<Backend>().is_err());
        assert!("".parse::<Backend>().is_err());

        let err = "vpcs".parse::<Backend>().unwrap_err();
        assert_eq!(err.to_string(), "unknown backend: vpcs");
        let _: &dyn std::error::Error = &err;
    }

    #[test]
    fn test_updates_produce_new_values() {
        let original = router();
        let renamed = original.with_display_name_prefix("SW");
        assert_eq!(original.display_name_prefix(), "R");
        assert_eq!(renamed.display_name_prefix(), "SW");
        assert_eq!(renamed.nvram_kib(), 1024);

        let wider = original.with_ports(4, 0);
        assert_eq!(wider.ethernet_port_count(), 4);
        assert_eq!(wider.serial_port_count(), 0);
        assert_eq!(original.ethernet_port_count(), 1);
    }

    #[test]
    fn test_with_memory_rejects_zero() {
        let original = router();
        assert!(original.with_memory(0, 256).is_none());
        assert!(original.with_memory(1024, 0).is_none());
        assert_eq!(original.with_memory(2048, 512).map(|t| t.ram_mib()), Some(512));
    }

    #[test]
    fn test_template_serializes_with_raw_keys() {
        let json = serde_json::to_value(TemplateEntry { id: "R".into(), template: router() }).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "R",
                "type": "iol",
                "name": "R",
                "icon": "Router.png",
                "nvram": 1024,
                "ram": 256,
                "ethernet": 1,
                "serial": 1,
            })
        );
    }
}
