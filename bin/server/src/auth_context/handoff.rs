//! Browser-side handling of cross-domain one-time tokens.

use super::AuthContext;

/// Watches the URL for a one-time token and redeems it.
///
/// Runs while the context is authenticated, on every client-side navigation
/// and on back/forward navigation. The token is removed from the address bar
/// before redemption starts, so each token is presented at most once. The
/// popstate listener is removed when the owning component unmounts.
pub fn use_one_time_token(ctx: AuthContext) {
    #[cfg(feature = "hydrate")]
    {
        use leptos::prelude::*;
        use leptos_router::hooks::use_location;

        let location = use_location();
        Effect::new(move || {
            location.search.track();
            if ctx.is_authenticated() {
                take_one_time_token(ctx);
            }
        });

        let listener = window_event_listener(leptos::ev::popstate, move |_| {
            if ctx.flags.get_untracked().is_authenticated {
                take_one_time_token(ctx);
            }
        });
        on_cleanup(move || listener.remove());
    }

    #[cfg(not(feature = "hydrate"))]
    let _ = ctx;
}

#[cfg(feature = "hydrate")]
fn take_one_time_token(ctx: AuthContext) {
    use amber_lantern_auth::detect_handoff;
    use leptos::prelude::window;
    use leptos::task::spawn_local;
    use wasm_bindgen::JsValue;

    use crate::user::redeem_handoff;

    let window = window();
    let Ok(href) = window.location().href() else {
        return;
    };
    let Some(handoff) = detect_handoff(&href) else {
        return;
    };

    match window.history() {
        Ok(history) => {
            if let Err(error) = history.replace_state_with_url(
                &JsValue::NULL,
                "",
                Some(handoff.cleaned_url.as_str()),
            ) {
                tracing::debug!(?error, "Failed to strip one-time token from URL");
            }
        }
        Err(error) => tracing::debug!(?error, "History API unavailable"),
    }

    let Some(token) = handoff.token else {
        return;
    };

    spawn_local(async move {
        match redeem_handoff(token).await {
            Ok(true) => ctx.refresh_session(),
            Ok(false) => tracing::debug!("One-time token not accepted"),
            Err(error) => tracing::debug!(error = %error, "One-time token redemption failed"),
        }
    });
}
