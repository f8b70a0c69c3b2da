use log::{info, warn};

use crate::{
    cache::cache_key,
    register::RegisterContext,
    store::StoreError,
    validate::{is_device_key, DeviceToken, RegisterRequest, DELETED},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Key already bound to this token.
    Unchanged,
    /// Supplied key (or a freshly minted one) inserted for the token.
    Created,
    /// Key was bound to another token; a fresh key was minted instead.
    Reassigned,
    Deleted,
    NothingToDelete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub key: String,
    pub token: String,
    pub outcome: Outcome,
}

impl Resolution {
    pub fn is_noop(&self) -> bool {
        matches!(self.outcome, Outcome::Unchanged | Outcome::NothingToDelete)
    }

    pub fn is_deletion(&self) -> bool {
        matches!(self.outcome, Outcome::Deleted | Outcome::NothingToDelete)
    }
}

/// Decides what a validated request does to the store and applies it.
pub async fn resolve(
    ctx: &RegisterContext,
    origin: &str,
    request: RegisterRequest<'_>,
) -> Result<Resolution, StoreError> {
    let resolution = match request.token {
        DeviceToken::Deleted => unregister(ctx, origin, request.key).await?,
        DeviceToken::Live(token) => register_token(ctx, request.key, token).await?,
    };

    info!(
        "{:?}: key={} token={}",
        resolution.outcome, resolution.key, resolution.token
    );
    Ok(resolution)
}

async fn unregister(
    ctx: &RegisterContext,
    origin: &str,
    key: &str,
) -> Result<Resolution, StoreError> {
    // Stored keys are always well-formed, so nothing else can match.
    let existing = if is_device_key(key) {
        ctx.store.find_by_key(key).await?
    } else {
        None
    };

    let outcome = match existing {
        Some(existing) => {
            let stale = cache_key(origin, &existing.key, &existing.token);
            if let Err(e) = ctx.cache.delete(&stale).await {
                warn!("Failed to invalidate {}: {}", stale, e);
            }
            ctx.store.delete_by_key(key).await?;
            Outcome::Deleted
        }
        None => Outcome::NothingToDelete,
    };

    Ok(Resolution {
        key: key.to_string(),
        token: DELETED.to_string(),
        outcome,
    })
}

async fn register_token(
    ctx: &RegisterContext,
    key: &str,
    token: &str,
) -> Result<Resolution, StoreError> {
    let well_formed = is_device_key(key);
    let existing = if well_formed {
        ctx.store.find_by_key(key).await?
    } else {
        None
    };

    let (key, outcome) = match existing {
        Some(r) if r.token == token => (r.key, Outcome::Unchanged),
        // A key is never rebound to another token in place.
        Some(_) => (ctx.keys.generate(), Outcome::Reassigned),
        None if well_formed => (key.to_string(), Outcome::Created),
        None => (ctx.keys.generate(), Outcome::Created),
    };

    if outcome != Outcome::Unchanged {
        // Not transactional. A crash in between leaves the token unregistered
        // until the client registers again.
        ctx.store.delete_by_token(token).await?;
        ctx.store.insert(&key, token).await?;
    }

    Ok(Resolution {
        key,
        token: token.to_string(),
        outcome,
    })
}
