//! End-to-end scenarios driven through `ClientContext` over the scripted
//! transport.

mod browser_test;
mod helpers;
mod session_test;
mod upload_test;
