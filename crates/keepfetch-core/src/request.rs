//! Minimal HTTP/1.1 GET emitter for keep-alive reuse.

use crate::host::HostBinding;
use crate::task::DownloadTask;

/// `User-Agent` sent when the config does not override it.
pub fn default_user_agent() -> String {
    format!("keepfetch/{}", env!("CARGO_PKG_VERSION"))
}

/// Build the request bytes for `task`.
///
/// Compression is disabled (`Accept-Encoding: identity`): the framer only
/// understands raw Content-Length bodies.
pub fn build_get(binding: &HostBinding, task: &DownloadTask, user_agent: &str) -> Vec<u8> {
    format!(
        "GET {target} HTTP/1.1\r\n\
         Host: {host}\r\n\
         User-Agent: {user_agent}\r\n\
         Accept: */*\r\n\
         Accept-Encoding: identity\r\n\
         Connection: keep-alive\r\n\
         \r\n",
        target = task.request_target(),
        host = binding.host_header(),
    )
    .into_bytes()
}
