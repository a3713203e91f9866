//! Wheel filename and URL construction.
//!
//! Pure string templating over a release tag and a
//! [`RuntimeFingerprint`](crate::runtime::RuntimeFingerprint): the same
//! inputs always produce the same URL, and any change to a fingerprint
//! field changes the filename.

use crate::runtime::RuntimeFingerprint;

/// GitHub repository publishing prebuilt flash-attn wheels
pub const GITHUB_REPO: &str = "Dao-AILab/flash-attention";

/// Wheel filename for a release tag and runtime fingerprint.
///
/// The `+` separating the wheel version from its local-version segment is
/// pre-encoded as `%2B` because the name is only ever used inside a URL.
#[must_use]
pub fn wheel_filename(release_tag: &str, fingerprint: &RuntimeFingerprint) -> String {
    let version = release_tag.strip_prefix('v').unwrap_or(release_tag);
    let abi = if fingerprint.cxx11abi { "TRUE" } else { "FALSE" };
    format!(
        "flash_attn-{version}%2Bcu{cuda}torch{torch}cxx11abi{abi}-{py}-{py}-{platform}.whl",
        cuda = fingerprint.torch_cuda,
        torch = fingerprint.torch_major_minor,
        py = fingerprint.python_tag,
        platform = fingerprint.platform_tag,
    )
}

/// Full download URL for a release tag and runtime fingerprint.
#[must_use]
pub fn wheel_url(release_tag: &str, fingerprint: &RuntimeFingerprint) -> String {
    format!(
        "https://github.com/{GITHUB_REPO}/releases/download/{release_tag}/{}",
        wheel_filename(release_tag, fingerprint)
    )
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use crate::runtime::PlatformTag;
    use proptest::prelude::*;

    fn arb_fingerprint() -> impl Strategy<Value = RuntimeFingerprint> {
        (
            "[0-9]{1,2}\\.[0-9]{1,2}",
            "12\\.[0-9]{1,2}",
            "cp3[0-9]{1,2}",
            any::<bool>(),
            prop_oneof![Just(PlatformTag::LinuxX8664), Just(PlatformTag::LinuxAarch64)],
        )
            .prop_map(|(torch_mm, cuda, py, abi, platform)| RuntimeFingerprint {
                torch_version: format!("{torch_mm}.0"),
                torch_major_minor: torch_mm,
                torch_cuda: cuda,
                python_tag: py,
                cxx11abi: abi,
                platform_tag: platform,
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        #[test]
        fn prop_url_is_deterministic(fp in arb_fingerprint(), tag in "v[0-9]\\.[0-9]\\.[0-9]") {
            prop_assert_eq!(wheel_url(&tag, &fp), wheel_url(&tag, &fp));
        }

        #[test]
        fn prop_url_embeds_tag_and_filename(fp in arb_fingerprint(), tag in "v[0-9]\\.[0-9]\\.[0-9]") {
            let url = wheel_url(&tag, &fp);
            let download_segment = format!("/download/{}/", tag);
            prop_assert!(url.contains(&download_segment));
            prop_assert!(url.ends_with(&wheel_filename(&tag, &fp)));
            prop_assert!(url.ends_with(".whl"));
        }
    }
}
