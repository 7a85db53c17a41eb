//! Fatal runtime error reporting.
//!
//! Generated programs have no recovery path: every runtime error prints a
//! message with the source line, walks the scope-frame stack to name the
//! functions being executed, and terminates the process. Stdout is flushed
//! first so output printed before the failure is not lost.

use crate::frames;
use std::ffi::{CStr, c_char};
use std::io::{self, Write};
use std::process;

/// Borrow a C string for display. Returns a placeholder on null.
pub(crate) unsafe fn display_cstr<'a>(text: *const c_char) -> std::borrow::Cow<'a, str> {
    if text.is_null() {
        return std::borrow::Cow::Borrowed("?");
    }
    unsafe { CStr::from_ptr(text) }.to_string_lossy()
}

pub(crate) fn fatal(line: i64, msg: &str) -> ! {
    let _ = io::stdout().flush();
    eprintln!("error at line {}: {}", line, msg);

    unsafe {
        let mut frame = frames::current_frame();
        while !frame.is_null() {
            if !(*frame).funcname.is_null() {
                eprintln!("\tin {}", display_cstr((*frame).funcname));
            }
            frame = (*frame).parent;
        }
    }

    process::exit(1);
}
