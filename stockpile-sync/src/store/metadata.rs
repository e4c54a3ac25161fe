//! Per-artifact version listing (`maven-metadata.xml`).
//!
//! Only the elements the engine needs are read; anything else in an existing
//! listing is ignored and dropped on rewrite.

use chrono::{DateTime, Utc};

/// File name of the version listing stored beside an artifact's version
/// directories.
pub const LISTING_FILE: &str = "maven-metadata.xml";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VersionListing {
    pub group: String,
    pub artifact: String,
    pub latest: Option<String>,
    pub release: Option<String>,
    pub versions: Vec<String>,
    pub last_updated: Option<String>,
}

impl VersionListing {
    pub fn new(group: impl Into<String>, artifact: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            artifact: artifact.into(),
            ..Self::default()
        }
    }

    /// `/`-separated location of the listing relative to a store root.
    pub fn remote_path(group: &str, artifact: &str) -> String {
        format!("{}/{}/{}", group.replace('.', "/"), artifact, LISTING_FILE)
    }

    /// Parse a listing leniently. Missing elements stay empty.
    pub fn parse(xml: &str) -> Self {
        let versions = section(xml, "versions")
            .map(|block| tag_values(block, "version"))
            .unwrap_or_default();
        Self {
            group: first_tag(xml, "groupId").unwrap_or_default(),
            artifact: first_tag(xml, "artifactId").unwrap_or_default(),
            latest: first_tag(xml, "latest"),
            release: first_tag(xml, "release"),
            versions,
            last_updated: first_tag(xml, "lastUpdated"),
        }
    }

    /// Record `version` as the newest version. `release` only moves for
    /// non-snapshot versions.
    pub fn add_version(&mut self, version: &str, snapshot: bool, now: DateTime<Utc>) {
        if !self.versions.iter().any(|v| v == version) {
            self.versions.push(version.to_owned());
        }
        self.latest = Some(version.to_owned());
        if !snapshot {
            self.release = Some(version.to_owned());
        }
        self.last_updated = Some(now.format("%Y%m%d%H%M%S").to_string());
    }

    /// `latest`, falling back to the last listed version.
    pub fn latest_version(&self) -> Option<&str> {
        self.latest
            .as_deref()
            .or_else(|| self.versions.last().map(String::as_str))
    }

    pub fn to_xml(&self) -> String {
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<metadata>\n");
        xml.push_str(&format!("  <groupId>{}</groupId>\n", escape(&self.group)));
        xml.push_str(&format!(
            "  <artifactId>{}</artifactId>\n",
            escape(&self.artifact)
        ));
        xml.push_str("  <versioning>\n");
        if let Some(latest) = &self.latest {
            xml.push_str(&format!("    <latest>{}</latest>\n", escape(latest)));
        }
        if let Some(release) = &self.release {
            xml.push_str(&format!("    <release>{}</release>\n", escape(release)));
        }
        xml.push_str("    <versions>\n");
        for version in &self.versions {
            xml.push_str(&format!("      <version>{}</version>\n", escape(version)));
        }
        xml.push_str("    </versions>\n");
        if let Some(updated) = &self.last_updated {
            xml.push_str(&format!(
                "    <lastUpdated>{}</lastUpdated>\n",
                escape(updated)
            ));
        }
        xml.push_str("  </versioning>\n</metadata>\n");
        xml
    }
}

fn section<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = xml.find(&open)? + open.len();
    let end = xml[start..].find(&close)? + start;
    Some(&xml[start..end])
}

fn first_tag(xml: &str, tag: &str) -> Option<String> {
    section(xml, tag)
        .map(|v| unescape(v.trim()))
        .filter(|v| !v.is_empty())
}

fn tag_values(xml: &str, tag: &str) -> Vec<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let mut values = Vec::new();
    let mut rest = xml;
    while let Some(start) = rest.find(&open) {
        let after = &rest[start + open.len()..];
        let Some(end) = after.find(&close) else { break };
        let value = unescape(after[..end].trim());
        if !value.is_empty() {
            values.push(value);
        }
        rest = &after[end + close.len()..];
    }
    values
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const EXISTING: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<metadata modelVersion="1.1.0">
  <groupId>com.ci</groupId>
  <artifactId>index</artifactId>
  <versioning>
    <latest>v20200101000000</latest>
    <release>v20200101000000</release>
    <versions>
      <version>v20191231000000</version>
      <version>v20200101000000</version>
    </versions>
    <lastUpdated>20200101000000</lastUpdated>
  </versioning>
</metadata>
"#;

    #[test]
    fn parses_repository_listing() {
        let listing = VersionListing::parse(EXISTING);
        assert_eq!(listing.group, "com.ci");
        assert_eq!(listing.artifact, "index");
        assert_eq!(listing.versions.len(), 2);
        assert_eq!(listing.latest_version(), Some("v20200101000000"));
    }

    #[test]
    fn add_version_moves_latest_and_release() {
        let now = Utc.with_ymd_and_hms(2021, 6, 1, 12, 0, 0).unwrap();
        let mut listing = VersionListing::parse(EXISTING);
        listing.add_version("v20210601120000", false, now);
        listing.add_version("3-SNAPSHOT", true, now);
        assert_eq!(listing.latest.as_deref(), Some("3-SNAPSHOT"));
        assert_eq!(listing.release.as_deref(), Some("v20210601120000"));
        assert_eq!(listing.last_updated.as_deref(), Some("20210601120000"));

        let reparsed = VersionListing::parse(&listing.to_xml());
        assert_eq!(reparsed, listing);
    }

    #[test]
    fn latest_falls_back_to_last_version() {
        let xml = "<metadata><versioning><versions><version>1</version><version>2</version></versions></versioning></metadata>";
        let listing = VersionListing::parse(xml);
        assert_eq!(listing.latest, None);
        assert_eq!(listing.latest_version(), Some("2"));
    }

    #[test]
    fn garbage_parses_to_empty_listing() {
        let listing = VersionListing::parse("not xml");
        assert_eq!(listing.latest_version(), None);
        assert!(listing.versions.is_empty());
    }

    #[test]
    fn remote_path_uses_group_segments() {
        assert_eq!(
            VersionListing::remote_path("com.ci", "index"),
            "com/ci/index/maven-metadata.xml"
        );
    }
}
