//! Browser builds: route panics to the developer console instead of an opaque `unreachable`.

pub fn set_panic_hook() {
    console_error_panic_hook::set_once();
}
