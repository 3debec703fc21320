use agl_core::catalog::{AD_CONTAINER_PATTERNS, OVERLAY_PATTERNS, POPUP_HANDLER_PATTERNS};
use agl_core::dom::memory::check_selector;
use agl_core::profile::SiteProfile;
use agl_core::types::Aggressiveness;
use clap::ValueEnum;
use serde_json::json;

/// Command-line names for [`Aggressiveness`].
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum Level {
    Conservative,
    Standard,
    Aggressive,
}

impl From<Level> for Aggressiveness {
    fn from(level: Level) -> Self {
        match level {
            Level::Conservative => Aggressiveness::Conservative,
            Level::Standard => Aggressiveness::Standard,
            Level::Aggressive => Aggressiveness::Aggressive,
        }
    }
}

/// What the engine would run on one hostname.
pub struct CatalogSummary {
    pub profile: &'static SiteProfile,
    pub level: Aggressiveness,
    pub sections: Vec<(&'static str, &'static [&'static str])>,
    /// Patterns from every list the engine evaluates that fail to parse.
    pub invalid: Vec<(&'static str, String)>,
}

impl CatalogSummary {
    pub fn patterns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.sections.iter().flat_map(|(_, selectors)| selectors.iter().copied())
    }
}

pub fn summarize(hostname: &str, aggressiveness: Option<Aggressiveness>) -> CatalogSummary {
    let profile = SiteProfile::for_hostname(hostname);
    let catalog = profile.catalog(aggressiveness);

    let auxiliary = OVERLAY_PATTERNS
        .iter()
        .chain(AD_CONTAINER_PATTERNS)
        .chain(POPUP_HANDLER_PATTERNS)
        .chain(profile.overlay_exemptions)
        .chain(profile.content_exemptions)
        .copied();
    let invalid = catalog
        .patterns()
        .chain(auxiliary)
        .filter_map(|pattern| check_selector(pattern).err().map(|e| (pattern, e.to_string())))
        .collect();

    CatalogSummary {
        level: aggressiveness.unwrap_or(profile.aggressiveness),
        sections: catalog
            .sections()
            .iter()
            .map(|section| (section.name(), section.selectors()))
            .collect(),
        invalid,
        profile,
    }
}

pub fn cmd_catalog(hostname: &str, aggressiveness: Option<Aggressiveness>, as_json: bool) -> Result<(), String> {
    let summary = summarize(hostname, aggressiveness);
    let profile = summary.profile;
    let total = summary.patterns().count();

    if as_json {
        let sections: Vec<_> = summary
            .sections
            .iter()
            .map(|(name, selectors)| json!({"name": name, "selectors": selectors}))
            .collect();
        let output = json!({
            "hostname": hostname,
            "profile": profile.name,
            "aggressiveness": summary.level.as_str(),
            "patterns": total,
            "sections": sections,
            "overlayExemptions": profile.overlay_exemptions,
            "contentExemptions": profile.content_exemptions,
            "resourcePatterns": profile.resource_patterns,
            "guard": format!("{:?}", profile.guard),
            "invalid": summary
                .invalid
                .iter()
                .map(|(pattern, err)| json!({"selector": pattern, "error": err}))
                .collect::<Vec<_>>(),
        });
        let text = serde_json::to_string_pretty(&output).map_err(|e| format!("Failed to encode JSON: {}", e))?;
        println!("{text}");
    } else {
        println!("Host:            {}", hostname);
        println!("Profile:         {}", profile.name);
        println!("Aggressiveness:  {}", summary.level.as_str());
        println!("Guard:           {:?}", profile.guard);
        println!("Patterns:        {}", total);
        for (name, selectors) in &summary.sections {
            println!("  {:<18} {:>3}", name, selectors.len());
        }
        if !profile.overlay_exemptions.is_empty() {
            println!("Overlay exempt:  {}", profile.overlay_exemptions.join(", "));
        }
        if !profile.content_exemptions.is_empty() {
            println!("Content exempt:  {}", profile.content_exemptions.join(", "));
        }
        if !profile.resource_patterns.is_empty() {
            println!("Resources:       {}", profile.resource_patterns.join(", "));
        }
        for (pattern, err) in &summary.invalid {
            println!("✗ {}: {}", pattern, err);
        }
    }

    if summary.invalid.is_empty() {
        Ok(())
    } else {
        Err(format!("{} invalid selector(s)", summary.invalid.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_platform_gets_player_selectors() {
        let youtube = summarize("www.youtube.com", None);
        let generic = summarize("example.com", None);

        assert_eq!(youtube.profile.name, "video-platform");
        assert_eq!(generic.profile.name, "generic");
        assert!(youtube.patterns().any(|p| p == ".ytp-ad-module"));
        assert!(!generic.patterns().any(|p| p.starts_with(".ytp-ad")));
        assert!(generic.patterns().any(|p| p == ".ad-banner"));
        assert!(youtube.invalid.is_empty());
        assert!(generic.invalid.is_empty());
    }

    #[test]
    fn test_aggressiveness_override() {
        let conservative = summarize("example.com", Some(Aggressiveness::Conservative));
        let aggressive = summarize("example.com", Some(Aggressiveness::Aggressive));

        assert_eq!(conservative.level, Aggressiveness::Conservative);
        assert_eq!(aggressive.level, Aggressiveness::Aggressive);
        assert!(conservative.patterns().count() < aggressive.patterns().count());
        assert!(!conservative.patterns().any(|p| p == "[class*=\"overlay\"]"));

        let mirror = summarize("movies2watch.tv", None);
        assert_eq!(mirror.level, Aggressiveness::Aggressive);
    }

    #[test]
    fn test_cmd_catalog_prints_every_profile() {
        for host in ["example.com", "m.youtube.com", "movies2watch.tv"] {
            assert!(cmd_catalog(host, None, false).is_ok());
            assert!(cmd_catalog(host, Some(Aggressiveness::Aggressive), true).is_ok());
        }
    }
}
