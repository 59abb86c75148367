// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Release (changelog entry) handling: parsing package changelogs into
//! structured releases and filtering the ones that look like packaging
//! noise rather than user-facing changes.

/// One changelog entry, normalized from either RPM `%changelog` or Debian
/// `changelog.Debian.gz` into a common shape.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Release {
    pub version: String,
    /// Seconds since the Unix epoch, as recorded by the package's own
    /// changelog (not reinterpreted in any particular timezone).
    pub timestamp: i64,
    pub description: String,
}

/// Entries whose description contains one of these substrings (matched
/// case-sensitively) are dropped: they describe packaging churn, not a
/// release a user would care about. Case-sensitive because the list holds
/// both "rebuild" and "Rebuild" as distinct, deliberately chosen entries.
const NOISE_MARKERS: &[&str] = &[
    "rebuild",
    "Rebuild",
    "Mass rebuild",
    "rebuilt for",
    "spec file cleanup",
];

pub fn is_noise(description: &str) -> bool {
    NOISE_MARKERS.iter().any(|marker| description.contains(marker))
}

/// Parses an RPM-style `%changelog` section, one entry per header line of
/// the form `* Mon DD YYYY Name <email> - version-release`.
pub fn parse_rpm_changelog(text: &str) -> Vec<Release> {
    let mut releases = Vec::new();
    let mut lines = text.lines().peekable();

    while let Some(line) = lines.next() {
        let Some(rest) = line.strip_prefix("* ") else {
            continue;
        };
        let Some((date_part, header_rest)) = split_after_date(rest) else {
            continue;
        };
        let Some(timestamp) = parse_changelog_date(date_part) else {
            continue;
        };
        let version = header_rest
            .rsplit_once('-')
            .map(|(_, v)| v.trim().to_string())
            .unwrap_or_default();

        let mut body = Vec::new();
        while let Some(next) = lines.peek() {
            if next.starts_with("* ") {
                break;
            }
            let trimmed = lines.next().unwrap().trim_start_matches('-').trim();
            if !trimmed.is_empty() {
                body.push(trimmed.to_string());
            }
        }

        let description = body.join("\n");
        if version.is_empty() || is_noise(&description) {
            continue;
        }

        releases.push(Release {
            version,
            timestamp,
            description,
        });
    }

    releases
}

/// Parses a Debian `changelog` file: `pkg (version) distro; urgency=...`
/// header followed by a trailer line ` -- Maintainer <email>  Date`.
pub fn parse_debian_changelog(text: &str) -> Vec<Release> {
    let mut releases = Vec::new();
    let mut lines = text.lines().peekable();

    while let Some(line) = lines.next() {
        let Some(open) = line.find('(') else { continue };
        let Some(close) = line[open..].find(')') else {
            continue;
        };
        let version = line[open + 1..open + close].to_string();

        let mut body = Vec::new();
        let mut timestamp = 0;
        for next in lines.by_ref() {
            if let Some(date_part) = next.trim_start().strip_prefix("-- ") {
                if let Some((_, date)) = date_part.rsplit_once("  ") {
                    timestamp = parse_rfc2822_date(date).unwrap_or(0);
                }
                break;
            }
            let trimmed = next.trim_start_matches(['*', ' ']).trim();
            if !trimmed.is_empty() {
                body.push(trimmed.to_string());
            }
        }

        let description = body.join("\n");
        if is_noise(&description) {
            continue;
        }

        releases.push(Release {
            version,
            timestamp,
            description,
        });
    }

    releases
}

fn split_after_date(rest: &str) -> Option<(&str, &str)> {
    let mut parts = rest.splitn(4, ' ');
    let weekday = parts.next()?;
    let month = parts.next()?;
    let day = parts.next()?;
    let tail = parts.next()?;
    let (year, header) = tail.split_once(' ')?;
    let _ = weekday;
    let date_len = month.len() + 1 + day.len() + 1 + year.len();
    Some((&rest[..date_len], header))
}

fn parse_changelog_date(date: &str) -> Option<i64> {
    let mut parts = date.split_whitespace();
    let month = month_number(parts.next()?)?;
    let day: i64 = parts.next()?.parse().ok()?;
    let year: i64 = parts.next()?.parse().ok()?;
    Some(days_from_civil(year, month, day) * 86_400)
}

fn parse_rfc2822_date(date: &str) -> Option<i64> {
    let mut parts = date.split_whitespace();
    let day: i64 = parts.next()?.parse().ok()?;
    let month = month_number(parts.next()?)?;
    let year: i64 = parts.next()?.parse().ok()?;
    Some(days_from_civil(year, month, day) * 86_400)
}

fn month_number(name: &str) -> Option<i64> {
    const MONTHS: [&str; 12] = [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ];
    MONTHS
        .iter()
        .position(|m| name.starts_with(m))
        .map(|i| i as i64 + 1)
}

/// Howard Hinnant's civil-from-days algorithm, days since epoch for y-m-d.
fn days_from_civil(y: i64, m: i64, d: i64) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = (y - era * 400) as i64;
    let mp = (m + 9) % 12;
    let doy = (153 * mp + 2) / 5 + d - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noise_markers_are_case_sensitive() {
        assert!(is_noise("Mass rebuild for F40"));
        assert!(is_noise("rebuild against new glibc"));
        assert!(!is_noise("Rebuilding the UI from scratch"));
    }

    #[test]
    fn rpm_changelog_parses_version_and_drops_noise() {
        let text = "\
* Mon Jan 05 2026 Jane Doe <jane@example.com> - 2.3.0-1
- Add dark mode support
- Fix crash on startup

* Tue Dec 02 2025 Jane Doe <jane@example.com> - 2.2.0-1
- Mass rebuild
";
        let releases = parse_rpm_changelog(text);
        assert_eq!(releases.len(), 1);
        assert_eq!(releases[0].version, "2.3.0-1");
        assert!(releases[0].description.contains("dark mode"));
    }

    #[test]
    fn debian_changelog_parses_version() {
        let text = "\
myapp (1.4.2-1) unstable; urgency=medium

  * New upstream release
  * Fix memory leak

 -- Jane Doe <jane@example.com>  Mon, 05 Jan 2026 10:00:00 +0000
";
        let releases = parse_debian_changelog(text);
        assert_eq!(releases.len(), 1);
        assert_eq!(releases[0].version, "1.4.2-1");
        assert!(releases[0].description.contains("memory leak"));
    }

    #[test]
    fn days_from_civil_matches_known_epoch() {
        assert_eq!(days_from_civil(1970, 1, 1), 0);
        assert_eq!(days_from_civil(2026, 1, 1), 20454);
    }
}
