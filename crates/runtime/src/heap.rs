//! Heap blocks and the mark-sweep collector.
//!
//! Every array and function object lives in a block with a `{next, mark,
//! size}` header, linked into a thread-local list. [`mem_alloc`] runs a full
//! collection before every allocation; roots are the scope-frame stack and
//! the print-frame stack. A reference cell marks the value it points at, an
//! array marks its elements, a function marks its enclosed entries.

use crate::value::{TY_ARRAY, TY_FUNCTION, TYX_REFERENCE, RillArray, RillFunction, Value};
use crate::{frames, print};
use std::alloc::{self, Layout};
use std::cell::RefCell;
use std::mem;
use std::ptr;

#[repr(C)]
struct MemBlock {
    next: *mut MemBlock,
    mark: i64,
    size: usize,
}

struct Heap {
    first: *mut MemBlock,
    count: i64,
}

thread_local! {
    static HEAP: RefCell<Heap> = const {
        RefCell::new(Heap {
            first: ptr::null_mut(),
            count: 0,
        })
    };
}

fn block_layout(size: usize) -> Layout {
    Layout::from_size_align(mem::size_of::<MemBlock>() + size, mem::align_of::<MemBlock>())
        .expect("heap block layout overflow")
}

/// Header of the block whose data starts at `data`.
unsafe fn header_of(data: *mut u8) -> *mut MemBlock {
    unsafe { data.cast::<MemBlock>().sub(1) }
}

/// Allocate `size` zeroed bytes in a fresh heap block. Collects garbage
/// first, so every value the caller still needs must be reachable from a
/// scope frame at this point.
pub(crate) unsafe fn mem_alloc(size: usize) -> *mut u8 {
    collect();
    let layout = block_layout(size);
    let block = unsafe { alloc::alloc_zeroed(layout) }.cast::<MemBlock>();
    if block.is_null() {
        alloc::handle_alloc_error(layout);
    }
    HEAP.with(|heap| {
        let mut heap = heap.borrow_mut();
        unsafe {
            (*block).next = heap.first;
            (*block).mark = 0;
            (*block).size = size;
        }
        heap.first = block;
        heap.count += 1;
    });
    unsafe { block.add(1).cast::<u8>() }
}

unsafe fn mark_value(value: Value) {
    unsafe {
        match value.tag {
            TY_ARRAY => {
                let array = value.payload.array;
                let block = header_of(array.cast::<u8>());
                if (*block).mark != 0 {
                    return;
                }
                (*block).mark = 1;
                for i in 0..(*array).length {
                    mark_value(RillArray::item(array, i));
                }
            }
            TY_FUNCTION => {
                let func = value.payload.func;
                let block = header_of(func.cast::<u8>());
                if (*block).mark != 0 {
                    return;
                }
                (*block).mark = 1;
                let enclosed = RillFunction::enclosed_ptr(func);
                for i in 0..(*func).capture_count {
                    mark_value(*enclosed.add(i as usize));
                }
            }
            TYX_REFERENCE => {
                let cell = value.payload.cell;
                let block = header_of(cell.cast::<u8>());
                if (*block).mark != 0 {
                    return;
                }
                (*block).mark = 1;
                mark_value(*cell);
            }
            _ => {}
        }
    }
}

pub(crate) fn collect() {
    // Mark phase: scope frames top to bottom, then in-flight print values.
    unsafe {
        let mut frame = frames::current_frame();
        while !frame.is_null() {
            for i in 0..(*frame).length {
                mark_value(*(*frame).values.add(i as usize));
            }
            frame = (*frame).parent;
        }
    }
    print::for_each_print_value(|value| unsafe { mark_value(value) });

    // Sweep phase: unlink and free unmarked blocks, reset marks.
    HEAP.with(|heap| {
        let mut heap = heap.borrow_mut();
        let mut first = heap.first;
        let mut freed = 0;
        unsafe {
            let mut link: *mut *mut MemBlock = &mut first;
            while !(*link).is_null() {
                let block = *link;
                if (*block).mark == 0 {
                    *link = (*block).next;
                    let size = (*block).size;
                    alloc::dealloc(block.cast::<u8>(), block_layout(size));
                    freed += 1;
                } else {
                    (*block).mark = 0;
                    link = &raw mut (*block).next;
                }
            }
        }
        heap.first = first;
        heap.count -= freed;
    });
}

/// Run a collection now. Exposed for generated code and tests; the runtime
/// itself collects on every allocation.
#[unsafe(no_mangle)]
pub extern "C" fn rill_collect_garbage() {
    collect();
}

/// Number of live heap blocks.
#[unsafe(no_mangle)]
pub extern "C" fn rill_block_count() -> i64 {
    HEAP.with(|heap| heap.borrow().count)
}
