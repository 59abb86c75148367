// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Network-reaching extra checks (task runner step, not a registered
//! plugin): probes an app's homepage URL and logs a warning if the URL is
//! clearly dead. Warning-only by design — a dead upstream homepage is
//! noise worth surfacing, not grounds to drop an otherwise-valid app. Only
//! runs when `ExtraChecks` is enabled and `NoNetwork` is not set.

use std::time::Duration;

use crate::{app::App, config::Config};

fn probe(url: &str) -> bool {
    let agent = ureq::AgentBuilder::new()
        .timeout(Duration::from_secs(5))
        .build();
    match agent.head(url).call() {
        Ok(response) => response.status() < 400,
        Err(ureq::Error::Status(status, _)) => status < 400,
        Err(_) => false,
    }
}

/// Runs after every registered refinement plugin has run for `app`.
pub fn check(app: &mut App, config: &Config) {
    if config.no_network || !config.extra_checks {
        return;
    }
    let Some(url) = app.urls.get("homepage").cloned() else {
        return;
    };
    if !probe(&url) {
        tracing::warn!(app = %app.id, url, "homepage URL did not respond");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{app::AppKind, package::PackageId};

    #[test]
    fn skipped_when_extra_checks_disabled() {
        let mut app = App::new("foo.desktop", AppKind::Desktop, PackageId(0));
        app.urls.insert("homepage".into(), "https://example.invalid".into());
        let config = test_config();
        check(&mut app, &config);
        assert!(app.vetoes.is_empty());
    }

    fn test_config() -> Config {
        Config {
            temp_dir: "/tmp".into(),
            output_dir: "/tmp".into(),
            log_dir: "/tmp".into(),
            cache_dir: "/tmp".into(),
            mirror_uri: "https://example.invalid".into(),
            appdata_extra: None,
            screenshots_extra: None,
            old_metadata_path: None,
            no_network: true,
            api_version: "0.14".into(),
            add_cache_id: false,
            extra_checks: false,
            use_package_cache: true,
            max_threads: 1,
            basename: "appstream".into(),
        }
    }
}
