//! `credentials` command

use super::{Context, CredentialsAction};
use crate::export::dispatch::Provider;
use crate::settings::{mask, CredentialSet, CredentialStore};
use anyhow::{bail, Result};

pub fn run(ctx: &Context, action: CredentialsAction) -> Result<()> {
    let mut store = CredentialStore::load(ctx.credentials_path())?;

    match action {
        CredentialsAction::Show => {
            for line in describe(&store.snapshot()) {
                println!("{line}");
            }
        }
        CredentialsAction::Set { key, value } => {
            if Provider::field_for_key(&key).is_none() {
                bail!("Unknown credential key: {key} (see `credentials providers`)");
            }
            store.set(key.as_str(), value);
            store.save()?;
            println!("Saved {key}");
        }
        CredentialsAction::Unset { key } => {
            if store.unset(&key) {
                store.save()?;
                println!("Removed {key}");
            } else {
                println!("{key} was not set");
            }
        }
        CredentialsAction::Providers => {
            for provider in Provider::ALL {
                let keys: Vec<String> = provider
                    .fields()
                    .iter()
                    .map(|f| {
                        if f.required {
                            f.key.to_string()
                        } else {
                            format!("[{}]", f.key)
                        }
                    })
                    .collect();
                println!("{:<10} {:<14} {}", provider.name(), provider.display_name(), keys.join(" "));
            }
        }
    }
    Ok(())
}

/// One block per provider with secrets masked
fn describe(credentials: &CredentialSet) -> Vec<String> {
    let mut lines = Vec::new();
    for provider in Provider::ALL {
        let status = if provider.credentials_from(credentials).is_some() {
            "configured"
        } else {
            "not configured"
        };
        lines.push(format!("{} ({})", provider.display_name(), status));

        for field in provider.fields() {
            let value = match credentials.get(field.key) {
                Some(value) if field.secret => mask(value),
                Some(value) => value.to_string(),
                None => "-".to_string(),
            };
            lines.push(format!("  {}: {}", field.label, value));
        }
    }
    lines
}
