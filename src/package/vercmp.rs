// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Version comparators backing [`super::Package::compare`]: RPM's
//! `rpmvercmp` segment algorithm and a `dpkg`-style comparator for Debian's
//! `upstream_version`/`debian_revision` strings. Both are used only to
//! decide which of two packages sharing a source name is newer.

use std::cmp::Ordering;

/// Splits `s` into alternating runs of digits and non-digits, the unit both
/// comparators walk over.
fn segments(s: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let bytes = s.as_bytes();
    let mut start = 0;
    while start < bytes.len() {
        let is_digit = bytes[start].is_ascii_digit();
        let mut end = start + 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() == is_digit {
            end += 1;
        }
        out.push(&s[start..end]);
        start = end;
    }
    out
}

/// RPM's `rpmvercmp`: alternating digit/non-digit segments, numeric
/// segments compared as numbers (leading zeros stripped first), a digit
/// segment always outranks an alpha one, and a missing segment loses to a
/// present one unless the present one is alphabetic (tilde-less RPM has no
/// tilde rule, so this is the classic pre-tilde algorithm).
fn rpm_vercmp(a: &str, b: &str) -> Ordering {
    let a_segs = segments(a);
    let b_segs = segments(b);
    let len = a_segs.len().max(b_segs.len());

    for i in 0..len {
        let a_seg = a_segs.get(i).copied();
        let b_seg = b_segs.get(i).copied();
        let (a_seg, b_seg) = match (a_seg, b_seg) {
            (Some(a), Some(b)) => (a, b),
            (Some(a), None) => {
                return if a.as_bytes().first().is_some_and(u8::is_ascii_digit) {
                    Ordering::Greater
                } else {
                    Ordering::Less
                };
            }
            (None, Some(b)) => {
                return if b.as_bytes().first().is_some_and(u8::is_ascii_digit) {
                    Ordering::Less
                } else {
                    Ordering::Greater
                };
            }
            (None, None) => return Ordering::Equal,
        };

        let a_is_digit = a_seg.as_bytes().first().is_some_and(u8::is_ascii_digit);
        let b_is_digit = b_seg.as_bytes().first().is_some_and(u8::is_ascii_digit);

        let ordering = match (a_is_digit, b_is_digit) {
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (true, true) => {
                let a_trim = a_seg.trim_start_matches('0');
                let b_trim = b_seg.trim_start_matches('0');
                a_trim.len().cmp(&b_trim.len()).then_with(|| a_trim.cmp(b_trim))
            }
            (false, false) => a_seg.cmp(b_seg),
        };

        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    Ordering::Equal
}

/// `dpkg`'s character order for the non-digit comparator: `~` sorts before
/// everything including the empty string, letters sort before every other
/// ASCII character, and everything else keeps its normal ordinal value.
fn dpkg_char_order(c: u8) -> (u8, u8) {
    if c == b'~' {
        (0, 0)
    } else if c.is_ascii_alphabetic() {
        (2, c)
    } else if c == 0 {
        (1, 0)
    } else {
        (3, c)
    }
}

fn dpkg_cmp_non_digit(a: &str, b: &str) -> Ordering {
    let mut a_iter = a.bytes();
    let mut b_iter = b.bytes();
    loop {
        let a_c = a_iter.next();
        let b_c = b_iter.next();
        match (a_c, b_c) {
            (None, None) => return Ordering::Equal,
            (a_c, b_c) => {
                let ordering = dpkg_char_order(a_c.unwrap_or(0)).cmp(&dpkg_char_order(b_c.unwrap_or(0)));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
        }
    }
}

/// `dpkg`'s version comparator: alternating non-digit/digit runs, digit
/// runs compared numerically, non-digit runs compared with the tilde-aware
/// character order above.
fn dpkg_vercmp(a: &str, b: &str) -> Ordering {
    let mut a = a;
    let mut b = b;

    loop {
        let a_digit_start = a.find(|c: char| c.is_ascii_digit()).unwrap_or(a.len());
        let b_digit_start = b.find(|c: char| c.is_ascii_digit()).unwrap_or(b.len());
        let ordering = dpkg_cmp_non_digit(&a[..a_digit_start], &b[..b_digit_start]);
        if ordering != Ordering::Equal {
            return ordering;
        }
        a = &a[a_digit_start..];
        b = &b[b_digit_start..];

        if a.is_empty() && b.is_empty() {
            return Ordering::Equal;
        }

        let a_num_end = a.find(|c: char| !c.is_ascii_digit()).unwrap_or(a.len());
        let b_num_end = b.find(|c: char| !c.is_ascii_digit()).unwrap_or(b.len());
        let a_num = a[..a_num_end].trim_start_matches('0');
        let b_num = b[..b_num_end].trim_start_matches('0');
        let ordering = a_num.len().cmp(&b_num.len()).then_with(|| a_num.cmp(b_num));
        if ordering != Ordering::Equal {
            return ordering;
        }
        a = &a[a_num_end..];
        b = &b[b_num_end..];

        if a.is_empty() && b.is_empty() {
            return Ordering::Equal;
        }
    }
}

/// Compares an epoch/version/release triple using `segment_cmp` for the
/// version and release strings, epoch always decided first.
pub fn compare_evr(
    a: (u32, &str, &str),
    b: (u32, &str, &str),
    segment_cmp: fn(&str, &str) -> Ordering,
) -> Ordering {
    let (a_epoch, a_version, a_release) = a;
    let (b_epoch, b_version, b_release) = b;
    a_epoch
        .cmp(&b_epoch)
        .then_with(|| segment_cmp(a_version, b_version))
        .then_with(|| segment_cmp(a_release, b_release))
}

pub fn rpm_evr_cmp(a: (u32, &str, &str), b: (u32, &str, &str)) -> Ordering {
    compare_evr(a, b, rpm_vercmp)
}

pub fn deb_evr_cmp(a: (u32, &str, &str), b: (u32, &str, &str)) -> Ordering {
    compare_evr(a, b, dpkg_vercmp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpm_vercmp_orders_numeric_segments_by_value_not_length() {
        assert_eq!(rpm_vercmp("10", "9"), Ordering::Greater);
        assert_eq!(rpm_vercmp("1.0", "1.0"), Ordering::Equal);
        assert_eq!(rpm_vercmp("1.0", "1.1"), Ordering::Less);
    }

    #[test]
    fn rpm_vercmp_digit_segment_outranks_alpha() {
        assert_eq!(rpm_vercmp("1.0a", "1.0"), Ordering::Less);
    }

    #[test]
    fn dpkg_vercmp_tilde_sorts_first() {
        assert_eq!(dpkg_vercmp("1.0~beta1", "1.0"), Ordering::Less);
        assert_eq!(dpkg_vercmp("1.0~~", "1.0~"), Ordering::Less);
    }

    #[test]
    fn dpkg_vercmp_numeric_segments_ignore_leading_zeros() {
        assert_eq!(dpkg_vercmp("1.020", "1.20"), Ordering::Equal);
    }

    #[test]
    fn evr_cmp_decides_on_epoch_first() {
        assert_eq!(rpm_evr_cmp((1, "1.0", "1"), (0, "9.0", "1")), Ordering::Greater);
    }
}
