//! Matrix configuration validation with helpful error messages

use std::collections::HashSet;

use super::matrix_toml::MatrixConfig;
use crate::build::toolchains::PlatformFamily;
use crate::error::BuildError;

/// Validate the entire matrix configuration
pub fn validate_config(config: &MatrixConfig) -> Result<(), BuildError> {
    if config.variants.is_empty() {
        return Err(BuildError::config_with_hint(
            "no build variants configured",
            "Set variants = [\"release\", \"debug\"] or remove the key to use the default.",
        ));
    }
    ensure_unique("variant", config.variants.iter().map(|v| v.to_string()))?;

    if config.build.jobs == 0 {
        return Err(BuildError::config("[build] jobs must be at least 1"));
    }

    ensure_unique("platform", config.platforms.iter().map(|p| p.name.clone()))?;
    ensure_unique("product", config.products.iter().map(|p| p.name.clone()))?;

    // `android` is the Android pipeline's install segment
    for rule in &config.platforms {
        if rule.name.to_lowercase() == "android" && rule.family != PlatformFamily::Android {
            return Err(BuildError::config_with_hint(
                format!("platform '{}' must have family = \"android\"", rule.name),
                "Its install directory would collide with the Android pipeline's.",
            ));
        }
    }

    for product in &config.products {
        if product.platforms.is_empty() {
            return Err(BuildError::config(format!(
                "product '{}' lists no platforms",
                product.name
            )));
        }
        for platform in &product.platforms {
            let rule = config
                .platforms
                .iter()
                .find(|r| &r.name == platform)
                .ok_or_else(|| BuildError::UnknownPlatform {
                    platform: platform.clone(),
                })?;
            if rule.family == PlatformFamily::Android {
                return Err(BuildError::UnsupportedPlatform {
                    platform: platform.clone(),
                    reason: format!(
                        "product '{}' lists it, but android targets belong under [android]",
                        product.name
                    ),
                });
            }
        }
    }

    if let Some(android) = &config.android {
        if android.jobs == 0 {
            return Err(BuildError::config("[android] jobs must be at least 1"));
        }
        ensure_unique(
            "android product",
            android.products.iter().map(|p| p.name.clone()),
        )?;
        for product in &android.products {
            ensure_unique(
                &format!("target of android product '{}'", product.name),
                product.targets.iter().map(|t| t.name.clone()),
            )?;
            for target in &product.targets {
                if target.binaries.iter().any(|b| b.trim().is_empty()) {
                    return Err(BuildError::config(format!(
                        "android target '{}' has an empty binary path",
                        target.name
                    )));
                }
            }
        }
    }

    Ok(())
}

/// Names become lower-cased path segments, so they must differ ignoring case
fn ensure_unique<I>(kind: &str, names: I) -> Result<(), BuildError>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    for name in names {
        if name.trim().is_empty() {
            return Err(BuildError::config(format!("{} with an empty name", kind)));
        }
        if !seen.insert(name.to_lowercase()) {
            return Err(BuildError::config(format!(
                "duplicate {} '{}' (names are compared ignoring case)",
                kind, name
            )));
        }
    }
    Ok(())
}
