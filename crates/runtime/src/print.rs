//! Value printing with cycle detection.
//!
//! `print` renders its operands separated by single spaces and terminated by
//! a newline. Arrays are rendered recursively; a stack of in-flight print
//! values detects cycles so a self-referential array renders as `[...]`
//! instead of recursing forever. Strings nested inside arrays are quoted
//! with their escapes restored; top-level strings print raw.
//!
//! The print-frame stack is also a GC root set, mirroring the scope-frame
//! stack (no allocation happens while printing, but the invariant keeps the
//! collector's root discovery uniform).

use crate::error::display_cstr;
use crate::value::{
    TY_ARRAY, TY_BOOL, TY_FUNCTION, TY_INT, TY_NULL, TY_STRING, RillArray, Value,
};
use std::cell::RefCell;
use std::fmt::Write;

thread_local! {
    static PRINT_FRAMES: RefCell<Vec<Value>> = const { RefCell::new(Vec::new()) };
}

/// Visit every value currently being printed (GC root discovery).
pub(crate) fn for_each_print_value(mut visit: impl FnMut(Value)) {
    PRINT_FRAMES.with(|frames| {
        for value in frames.borrow().iter() {
            visit(*value);
        }
    });
}

fn is_printing(array: *mut RillArray) -> bool {
    PRINT_FRAMES.with(|frames| {
        let frames = frames.borrow();
        // Skip the top entry: that is the array currently being rendered.
        frames[..frames.len() - 1].iter().any(|value| {
            value.tag == TY_ARRAY && unsafe { value.payload.array } == array
        })
    })
}

unsafe fn render_array(out: &mut String, array: *mut RillArray) {
    if is_printing(array) {
        out.push_str("[...]");
        return;
    }

    out.push('[');
    unsafe {
        for i in 0..(*array).length {
            if i > 0 {
                out.push_str(", ");
            }
            render_repr(out, RillArray::item(array, i));
        }
    }
    out.push(']');
}

/// Render a value the way `print` shows it at top level.
pub(crate) unsafe fn render_value(out: &mut String, value: Value) {
    PRINT_FRAMES.with(|frames| frames.borrow_mut().push(value));

    unsafe {
        match value.tag {
            TY_NULL => out.push_str("null"),
            TY_BOOL => out.push_str(if value.payload.bits != 0 { "true" } else { "false" }),
            TY_INT => {
                let _ = write!(out, "{}", value.payload.bits);
            }
            TY_STRING => out.push_str(&display_cstr(value.payload.string)),
            TY_ARRAY => render_array(out, value.payload.array),
            TY_FUNCTION => {
                let _ = write!(out, "<function {:p}>", value.payload.func);
            }
            _ => {}
        }
    }

    PRINT_FRAMES.with(|frames| {
        frames.borrow_mut().pop();
    });
}

/// Render a value as it appears inside an array: strings are quoted with
/// escapes restored, everything else renders as at top level.
unsafe fn render_repr(out: &mut String, value: Value) {
    if value.tag != TY_STRING {
        unsafe { render_value(out, value) };
        return;
    }

    out.push('"');
    for c in unsafe { display_cstr(value.payload.string) }.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Print `count` values separated by single spaces, then a newline.
///
/// # Safety
/// `values` must point at `count` valid values.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rill_print(count: i64, values: *const Value) {
    let mut out = String::new();
    for i in 0..count {
        if i > 0 {
            out.push(' ');
        }
        unsafe { render_value(&mut out, *values.add(i as usize)) };
    }
    out.push('\n');
    print!("{}", out);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    unsafe fn rendered(value: Value) -> String {
        let mut out = String::new();
        unsafe { render_value(&mut out, value) };
        out
    }

    #[test]
    fn test_render_scalars() {
        unsafe {
            assert_eq!(rendered(Value::NULL), "null");
            assert_eq!(rendered(Value::bool(true)), "true");
            assert_eq!(rendered(Value::bool(false)), "false");
            assert_eq!(rendered(Value::int(-7)), "-7");
        }
    }

    #[test]
    fn test_render_top_level_string_is_raw() {
        let text = c"a \"b\"";
        unsafe {
            assert_eq!(rendered(Value::string(text.as_ptr())), "a \"b\"");
        }
    }

    #[test]
    fn test_render_array_quotes_nested_strings() {
        use crate::ops::rill_new_array;

        let items = [Value::int(1), Value::string(c"a\tb".as_ptr())];
        unsafe {
            let array = rill_new_array(2, items.as_ptr());
            assert_eq!(rendered(array), "[1, \"a\\tb\"]");
        }
    }

    #[test]
    fn test_cyclic_array_renders_with_ellipsis() {
        use crate::ops::rill_new_array;
        use crate::value::RillArray;

        let item = Value::NULL;
        unsafe {
            let array = rill_new_array(1, &item);
            *RillArray::items_ptr(array.payload.array) = array;
            assert_eq!(rendered(array), "[[...]]");
        }
    }
}
