//! Main Leptos application component and routing.

use leptos::prelude::*;
use leptos_meta::{Title, provide_meta_context};
use leptos_router::{
    components::{Route, Router, Routes},
    path,
};

use crate::auth_context::{AuthContextOptions, provide_auth_context, use_auth_context};
use crate::types::{InitialAuth, UserInfo};
use crate::user::{get_current_user, get_initial_auth};

/// The main application component.
#[component]
pub fn App() -> impl IntoView {
    provide_meta_context();
    let initial = Resource::new(|| (), |_| get_initial_auth());

    view! {
        <Title text="amber-lantern"/>
        <Router>
            <Suspense fallback=move || view! { <p>"Loading..."</p> }>
                {move || {
                    initial.get().map(|result| {
                        let initial = result.unwrap_or_else(|e| {
                            tracing::warn!(error = %e, "Failed to load initial auth state");
                            InitialAuth::default()
                        });
                        view! { <AuthScope initial=initial/> }
                    })
                }}
            </Suspense>
        </Router>
    }
}

/// Provides the auth context to every route.
#[component]
fn AuthScope(initial: InitialAuth) -> impl IntoView {
    provide_auth_context(AuthContextOptions {
        initial: initial.session,
        backend_disabled: initial.backend_disabled,
    });

    view! {
        <Header/>
        <main class="container">
            <Routes fallback=|| "Page not found.".into_view()>
                <Route path=path!("/") view=HomePage/>
                <Route path=path!("/account") view=AccountPage/>
            </Routes>
        </main>
    }
}

/// Header component with navigation and session status.
#[component]
fn Header() -> impl IntoView {
    let auth = use_auth_context();

    let label = move || {
        if auth.is_loading() {
            return "Loading...".to_string();
        }
        auth.session()
            .map(|session| UserInfo::from(session.user()).label())
            .unwrap_or_else(|| "Signed out".to_string())
    };
    let can_sign_out = move || auth.session().is_some_and(|session| !session.is_anonymous());

    view! {
        <header class="header">
            <div class="header-left">
                <a href="/" class="logo">"amber-lantern"</a>
            </div>
            <div class="header-right">
                <a href="/account">"Account"</a>
                <span class="user-name">{label}</span>
                <Show when=can_sign_out>
                    <button class="sign-out-button" on:click=move |_| auth.sign_out()>
                        "Sign out"
                    </button>
                </Show>
            </div>
        </header>
    }
}

/// The home page component.
#[component]
fn HomePage() -> impl IntoView {
    let auth = use_auth_context();

    let status = move || {
        let flags = auth.flags();
        if flags.is_loading {
            "Checking your session..."
        } else if flags.is_authenticated {
            "Connected."
        } else {
            "Not connected to the backend."
        }
    };

    view! {
        <div class="home-page">
            <h1>"amber-lantern"</h1>
            <p class="auth-status">{status}</p>
        </div>
    }
}

/// Account page showing the backend's view of the current user.
#[component]
fn AccountPage() -> impl IntoView {
    let auth = use_auth_context();
    let user = Resource::new(
        move || auth.connection().token(),
        |_| get_current_user(),
    );
    let expires = move || {
        auth.session()
            .map(|session| session.info().expires_at().format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "No active session".to_string())
    };

    view! {
        <div class="account-page">
            <h1>"Account"</h1>
            <Suspense fallback=move || view! { <p>"Loading..."</p> }>
                {move || {
                    user.get().map(|result| {
                        match result {
                            Ok(Some(user_info)) => view! {
                                <dl>
                                    <dt>"Name"</dt>
                                    <dd>{user_info.label()}</dd>
                                    <dt>"Email"</dt>
                                    <dd>{user_info.email.unwrap_or_else(|| "Not set".to_string())}</dd>
                                    <dt>"Session expires"</dt>
                                    <dd>{expires}</dd>
                                </dl>
                            }.into_any(),
                            Ok(None) => view! {
                                <p>"No account information available."</p>
                            }.into_any(),
                            Err(_) => view! {
                                <p>"Failed to load account. Please try again."</p>
                            }.into_any(),
                        }
                    })
                }}
            </Suspense>
        </div>
    }
}
