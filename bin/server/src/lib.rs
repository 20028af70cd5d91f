//! amber-lantern web server and UI.
//!
//! This crate wires the identity provider and the backend service into a
//! Leptos application: request-level session resolution on the server and a
//! reactive auth context in the browser.

#![allow(non_snake_case)]

pub mod app;
pub mod auth_context;
pub mod types;
pub mod user;

#[cfg(feature = "ssr")]
pub mod auth;
#[cfg(feature = "ssr")]
pub mod config;
#[cfg(feature = "ssr")]
pub mod error;

#[cfg(feature = "hydrate")]
#[wasm_bindgen::prelude::wasm_bindgen]
pub fn hydrate() {
    use crate::app::App;
    console_error_panic_hook::set_once();
    leptos::mount::hydrate_body(App);
}
