use serde::Deserialize;

/// One configured component. The options mapping is kept opaque here; the
/// registry deserializes it against the shape registered for `type_tag`.
#[derive(Debug, Clone)]
pub struct ComponentEntry {
    pub type_tag: String,
    pub tag: String,
    pub options: serde_yaml::Value,
}

impl<'de> Deserialize<'de> for ComponentEntry {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::de::Deserializer<'de>,
    {
        use serde::de::Error;

        let value = serde_yaml::Value::deserialize(deserializer)?;
        let serde_yaml::Value::Mapping(mut map) = value else {
            return Err(Error::custom("component entry must be a mapping"));
        };

        let type_tag = match map.remove("type") {
            Some(serde_yaml::Value::String(s)) => s,
            Some(_) => return Err(Error::custom("component 'type' must be a string")),
            None => return Err(Error::custom("component entry is missing 'type'")),
        };
        // An untagged component is addressed by its type name.
        let tag = match map.remove("tag") {
            Some(serde_yaml::Value::String(s)) => s,
            Some(_) => return Err(Error::custom("component 'tag' must be a string")),
            None => type_tag.clone(),
        };

        Ok(ComponentEntry {
            type_tag,
            tag,
            options: serde_yaml::Value::Mapping(map),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub inbounds: Vec<ComponentEntry>,
    #[serde(default)]
    pub outbounds: Vec<ComponentEntry>,
    #[serde(default)]
    pub endpoints: Vec<ComponentEntry>,
    #[serde(default, alias = "dns_transports")]
    pub dns: Vec<ComponentEntry>,
    #[serde(default)]
    pub services: Vec<ComponentEntry>,
}

impl Config {
    /// Append another document's components to this one.
    pub fn merge(&mut self, mut other: Config) {
        self.inbounds.append(&mut other.inbounds);
        self.outbounds.append(&mut other.outbounds);
        self.endpoints.append(&mut other.endpoints);
        self.dns.append(&mut other.dns);
        self.services.append(&mut other.services);
    }

    pub fn component_count(&self) -> usize {
        self.inbounds.len()
            + self.outbounds.len()
            + self.endpoints.len()
            + self.dns.len()
            + self.services.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_splits_type_and_tag() {
        let entry: ComponentEntry = serde_yaml::from_str(
            r#"
type: mixed
tag: proxy-in
listen: "127.0.0.1:1080"
"#,
        )
        .unwrap();
        assert_eq!(entry.type_tag, "mixed");
        assert_eq!(entry.tag, "proxy-in");
        let options = entry.options.as_mapping().unwrap();
        assert_eq!(options.len(), 1);
        assert!(options.contains_key("listen"));
    }

    #[test]
    fn test_entry_tag_defaults_to_type() {
        let entry: ComponentEntry = serde_yaml::from_str("type: direct").unwrap();
        assert_eq!(entry.tag, "direct");
        assert!(entry.options.as_mapping().unwrap().is_empty());
    }

    #[test]
    fn test_entry_requires_type() {
        let parsed = serde_yaml::from_str::<ComponentEntry>("tag: proxy-in");
        assert!(parsed.unwrap_err().to_string().contains("missing 'type'"));
    }

    #[test]
    fn test_config_rejects_unknown_sections() {
        let parsed = serde_yaml::from_str::<Config>("inbound_list: []");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_config_merge() {
        let mut first: Config =
            serde_yaml::from_str("outbounds: [{type: direct}]").unwrap();
        let second: Config =
            serde_yaml::from_str("outbounds: [{type: block}]\nservices: [{type: resolved}]")
                .unwrap();
        first.merge(second);
        assert_eq!(first.outbounds.len(), 2);
        assert_eq!(first.component_count(), 3);
    }
}
