//! Integration tests for Stack allocator

use std::cell::{Cell, RefCell};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::ptr;
use std::sync::Mutex;

use memstack::allocator::stack::guard::{GuardBack, GuardFront};
use memstack::allocator::stack::{StackHeader, UncheckedStackAllocator};
use memstack::prelude::*;
use pretty_assertions::assert_eq;
use rstest::rstest;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing_subscriber::filter::LevelFilter::TRACE)
        .with_test_writer()
        .try_init();
}

/// `repr(C)` so the size is exactly 12 and the alignment 4
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Triple {
    a: u32,
    b: u32,
    c: u32,
}

struct Tracked<'a> {
    index: usize,
    log: &'a RefCell<Vec<usize>>,
}

impl Drop for Tracked<'_> {
    fn drop(&mut self) {
        self.log.borrow_mut().push(self.index);
    }
}

#[derive(Clone)]
struct Counted<'a>(&'a Cell<usize>);

impl Drop for Counted<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get() + 1);
    }
}

#[test]
fn test_stack_allocator_basic() {
    init_tracing();
    let allocator = StackAllocator::<DefaultPolicy>::with_config(4096, StackConfig::default())
        .expect("Failed to create stack allocator");

    unsafe {
        let ptr = allocator.allocate(128, 8);

        ptr::write_bytes(ptr.as_ptr(), 0x55, 128);
        assert_eq!(*ptr.as_ptr(), 0x55);
        assert_eq!(*ptr.as_ptr().add(127), 0x55);

        allocator.deallocate(ptr.as_ptr());
    }
    assert_eq!(allocator.used_size(), 0);
    assert_eq!(allocator.available(), 4096);
}

#[test]
fn test_stack_allocator_lifo() {
    let allocator = StackAllocator::new(4096).expect("Failed to create stack allocator");

    unsafe {
        // Allocate in order: A, B, C
        let ptr_a = allocator.allocate(64, 8);
        let after_a = allocator.used_size();
        let ptr_b = allocator.allocate(64, 8);
        let after_b = allocator.used_size();
        let ptr_c = allocator.allocate(64, 8);

        ptr::write_bytes(ptr_a.as_ptr(), 0xAA, 64);
        ptr::write_bytes(ptr_b.as_ptr(), 0xBB, 64);
        ptr::write_bytes(ptr_c.as_ptr(), 0xCC, 64);

        // Verify
        assert_eq!(*ptr_a.as_ptr(), 0xAA);
        assert_eq!(*ptr_b.as_ptr(), 0xBB);
        assert_eq!(*ptr_c.as_ptr(), 0xCC);

        // Deallocate in LIFO order: C, B, A
        allocator.deallocate(ptr_c.as_ptr());
        assert_eq!(allocator.used_size(), after_b);
        allocator.deallocate(ptr_b.as_ptr());
        assert_eq!(allocator.used_size(), after_a);
        allocator.deallocate(ptr_a.as_ptr());
    }
    assert_eq!(allocator.used_size(), 0);
}

#[test]
fn test_unchecked_blocks_have_no_metadata() {
    let allocator = UncheckedStackAllocator::with_config(64, StackConfig::default()).unwrap();

    unsafe {
        let first = allocator.allocate_block(8, 8);
        let second = allocator.allocate_block(16, 8);
        assert_eq!((first.start_offset(), first.end_offset()), (0, 8));
        assert_eq!((second.start_offset(), second.end_offset()), (8, 24));
        assert_eq!(allocator.used_size(), 24);

        allocator.deallocate_block(second);
        assert_eq!(allocator.used_size(), 8);
        allocator.deallocate_block(first);
        assert_eq!(allocator.used_size(), 0);
    }
}

#[test]
fn test_new_object_layout() {
    assert_eq!(size_of::<Triple>(), 12);
    assert_eq!(align_of::<Triple>(), 4);

    let allocator = StackAllocator::new(256).unwrap();
    let base = allocator.mark();
    assert_eq!(base.offset(), 0);

    unsafe {
        let triple = allocator.new_object(Triple { a: 1, b: 2, c: 3 });
        assert_eq!(triple.as_ptr().addr() % 4, 0);
        assert!(allocator.owns(triple.as_ptr().cast()));
        assert_eq!(triple.start_offset(), 0);
        assert_eq!(triple.end_offset(), allocator.used_size());
        assert_eq!(
            triple.end_offset(),
            GuardFront::SIZE + size_of::<Triple>() + GuardBack::SIZE
        );
        assert_eq!(*triple, Triple { a: 1, b: 2, c: 3 });
        allocator.delete(triple);
    }
    assert_eq!(allocator.used_size(), 0);
}

#[test]
fn test_new_raw_stores_header_before_payload() {
    let allocator = StackAllocator::new(256).unwrap();

    unsafe {
        let triple = allocator.new_raw(Triple { a: 7, b: 8, c: 9 });
        assert_eq!(triple.as_ptr().addr() % 4, 0);
        assert!(allocator.owns(triple.as_ptr().cast()));

        let payload = allocator.used_size() - GuardBack::SIZE - size_of::<Triple>();
        assert_eq!(payload, GuardFront::SIZE + size_of::<StackHeader>());

        let header = triple
            .as_ptr()
            .cast::<u8>()
            .sub(size_of::<StackHeader>())
            .cast::<StackHeader>()
            .read_unaligned();
        assert_eq!(header.start_offset, 0);
        assert_eq!(header.end_offset, allocator.used_size());

        allocator.delete_raw(triple.as_ptr());
    }
    assert_eq!(allocator.used_size(), 0);
}

#[rstest]
#[case(1)]
#[case(2)]
#[case(4)]
#[case(8)]
#[case(16)]
#[case(64)]
#[case(256)]
fn test_allocate_respects_alignment(#[case] alignment: usize) {
    let allocator = StackAllocator::new(4096).unwrap();
    unsafe {
        let odd = allocator.allocate(3, 1);
        let ptr = allocator.allocate(24, alignment);
        assert_eq!(ptr.as_ptr().addr() % alignment, 0);
        assert!(allocator.owns(ptr.as_ptr()));
        allocator.deallocate(ptr.as_ptr());
        allocator.deallocate(odd.as_ptr());
    }
    assert_eq!(allocator.used_size(), 0);
}

#[test]
fn test_allocate_default_uses_configured_alignment() {
    let config = StackConfig::default().with_alignment(32);
    let allocator = StackAllocator::<DefaultPolicy>::with_config(1024, config).unwrap();
    unsafe {
        let filler = allocator.allocate(5, 1);
        let ptr = allocator.allocate_default(10);
        assert_eq!(ptr.as_ptr().addr() % 32, 0);
        allocator.deallocate(ptr.as_ptr());
        allocator.deallocate(filler.as_ptr());
    }
}

#[test]
fn test_out_of_memory_leaves_offset_unchanged() {
    let allocator = StackAllocator::new(64).unwrap();
    unsafe {
        let block = allocator.allocate_block(8, 8);
        let used = allocator.used_size();

        let result = catch_unwind(AssertUnwindSafe(|| {
            allocator.allocate_block(64, 8);
        }));
        assert!(result.is_err());
        assert_eq!(allocator.used_size(), used);

        allocator.deallocate_block(block);
    }
    assert_eq!(allocator.used_size(), 0);
}

#[test]
fn test_size_check_counts_the_back_guard() {
    let allocator = StackAllocator::new(64).unwrap();
    let fits = 64 - GuardFront::SIZE - GuardBack::SIZE;
    unsafe {
        let block = allocator.allocate_block(fits, 1);
        assert_eq!(allocator.used_size(), 64);
        allocator.deallocate_block(block);

        let result = catch_unwind(AssertUnwindSafe(|| {
            allocator.allocate_block(fits + 1, 1);
        }));
        assert!(result.is_err());
    }
    assert_eq!(allocator.used_size(), 0);
}

#[test]
fn test_new_array_drops_every_element_in_reverse() {
    let log = RefCell::new(Vec::new());
    let allocator = StackAllocator::new(1024).unwrap();

    unsafe {
        let before = allocator.mark();
        let array = allocator.new_array_with(5, |index| Tracked { index, log: &log });
        assert_eq!(array.count(), 5);
        assert_eq!(array.start_offset(), before.offset());
        assert_eq!(array.iter().map(|t| t.index).collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);

        allocator.delete_array(array);
        assert_eq!(allocator.used_size(), before.offset());
    }
    assert_eq!(*log.borrow(), vec![4, 3, 2, 1, 0]);
}

#[test]
fn test_new_array_clones_value() {
    let allocator = StackAllocator::new(1024).unwrap();
    unsafe {
        let mut array = allocator.new_array(4, String::from("x"));
        array[2].push('y');
        assert_eq!(&*array, &["x", "x", "xy", "x"]);
        allocator.delete_array(array);
    }
    assert_eq!(allocator.used_size(), 0);
}

#[test]
fn test_raw_array_round_trip() {
    let drops = Cell::new(0);
    let allocator = StackAllocator::new(1024).unwrap();

    unsafe {
        let array = allocator.new_array_raw(5, Counted(&drops));
        let after_construction = drops.get();

        allocator.delete_array_raw(array.as_ptr());
        assert_eq!(drops.get() - after_construction, 5);
    }
    assert_eq!(allocator.used_size(), 0);
}

#[test]
fn test_out_of_order_array_delete_drops_nothing() {
    let drops = Cell::new(0);
    let allocator = StackAllocator::new(1024).unwrap();

    unsafe {
        let array = allocator.new_array_with(5, |_| Counted(&drops));
        let above = allocator.new_object(0u64);
        let used = allocator.used_size();

        let result = catch_unwind(AssertUnwindSafe(|| allocator.delete_array(array)));
        assert!(result.is_err());
        assert_eq!(drops.get(), 0);
        assert_eq!(allocator.used_size(), used);

        allocator.delete(above);
    }
}

#[test]
fn test_out_of_order_raw_array_delete_drops_nothing() {
    let drops = Cell::new(0);
    let allocator = StackAllocator::new(1024).unwrap();

    unsafe {
        let array = allocator.new_array_raw(5, Counted(&drops));
        let after_construction = drops.get();
        let above = allocator.new_raw(7u64);

        let result = catch_unwind(AssertUnwindSafe(|| {
            allocator.delete_array_raw(array.as_ptr());
        }));
        assert!(result.is_err());
        assert_eq!(drops.get(), after_construction);

        // the array is still intact once the newer allocation is gone
        allocator.delete_raw(above.as_ptr());
        allocator.delete_array_raw(array.as_ptr());
        assert_eq!(drops.get() - after_construction, 5);
    }
    assert_eq!(allocator.used_size(), 0);
}

#[test]
fn test_corrupted_array_delete_drops_nothing() {
    let drops = Cell::new(0);
    let allocator = StackAllocator::new(1024).unwrap();

    unsafe {
        let array = allocator.new_array_with(3, |_| Counted(&drops));
        let back_guard = array
            .as_ptr()
            .cast::<u8>()
            .cast_mut()
            .add(3 * size_of::<Counted<'_>>());
        ptr::write_bytes(back_guard, 0xAB, GuardBack::SIZE);

        let result = catch_unwind(AssertUnwindSafe(|| allocator.delete_array(array)));
        assert!(result.is_err());
    }
    assert_eq!(drops.get(), 0);
}

#[test]
fn test_untyped_array_returns_count() {
    let allocator = StackAllocator::new(1024).unwrap();
    unsafe {
        let ptr = allocator.allocate_array(6, 4, 4);
        ptr::write_bytes(ptr.as_ptr(), 0, 24);
        assert_eq!(allocator.deallocate_array(ptr.as_ptr(), 4), 6);
    }
    assert_eq!(allocator.used_size(), 0);
}

#[test]
fn test_new_object_with_can_allocate_inside_constructor() {
    let allocator = StackAllocator::new(1024).unwrap();
    unsafe {
        let value = allocator.new_object_with(|| {
            let scratch = allocator.allocate_block(32, 8);
            let seed = scratch.size() as u64;
            allocator.deallocate_block(scratch);
            seed * 2
        });
        assert_eq!(*value, 64);
        assert_eq!(value.end_offset(), allocator.used_size());
        allocator.delete(value);
    }
    assert_eq!(allocator.used_size(), 0);
}

#[test]
fn test_reset_reuses_memory() {
    let allocator = StackAllocator::new(1024).unwrap();
    unsafe {
        let first = allocator.allocate(16, 8);
        allocator.allocate(100, 16);
        allocator.new_object(42u64);
        assert!(allocator.used_size() > 0);

        allocator.reset();
        assert_eq!(allocator.used_size(), 0);

        let again = allocator.allocate(16, 8);
        assert_eq!(again, first);
        allocator.deallocate(again.as_ptr());
    }
}

#[test]
fn test_stack_allocator_marker() {
    let allocator = StackAllocator::new(4096).unwrap();

    unsafe {
        let keep = allocator.new_object(1u32);
        // Get marker
        let marker = allocator.mark();

        // Make some allocations
        let ptr1 = allocator.allocate(64, 8);
        let ptr2 = allocator.allocate(64, 8);
        ptr::write_bytes(ptr1.as_ptr(), 0x11, 64);
        ptr::write_bytes(ptr2.as_ptr(), 0x22, 64);

        // Rewind to marker - should free both allocations
        allocator.rewind(marker);
        assert_eq!(allocator.used_size(), marker.offset());

        // Allocate again - should reuse space
        let ptr3 = allocator.allocate(64, 8);
        assert_eq!(ptr3, ptr1);
        allocator.deallocate(ptr3.as_ptr());

        allocator.delete(keep);
    }
    assert_eq!(allocator.used_size(), 0);
}

#[test]
fn test_stack_frame_restores_on_drop() {
    let allocator = StackAllocator::new(4096).unwrap();

    unsafe {
        {
            let frame = allocator.frame();
            assert_eq!(frame.marker().offset(), 0);
            frame.allocator().allocate(128, 16);
            frame.allocator().new_array(8, 0u64);
            assert!(allocator.used_size() > 128);
        }
        assert_eq!(allocator.used_size(), 0);

        let frame = allocator.frame();
        allocator.allocate_block(32, 8);
        frame.restore();
    }
    assert_eq!(allocator.used_size(), 0);
}

#[test]
fn test_usage_reporter_sees_every_offset_change() {
    let tracker = UsageTracker::new();
    let config = StackConfig::default().with_name("frame-scratch");
    let allocator = StackAllocator::<DefaultPolicy>::with_reporter(512, config, &tracker).unwrap();

    unsafe {
        let a = allocator.allocate(32, 8);
        let peak = allocator.used_size();
        assert_eq!(tracker.last_used(), peak);

        let b = allocator.new_object(5u16);
        allocator.delete(b);
        allocator.deallocate(a.as_ptr());
        assert_eq!(tracker.last_used(), 0);

        allocator.allocate_block(8, 8);
        allocator.reset();
    }

    assert_eq!(tracker.report_count(), 6);
    assert_eq!(tracker.total(), 512);
    assert_eq!(tracker.last_used(), 0);
    assert_eq!(tracker.last_name().as_deref(), Some("frame-scratch"));
    assert!(tracker.peak_used() > 32);
}

#[test]
fn test_closure_reporter() {
    let seen = Mutex::new(Vec::new());
    let reporter = |_: &str, used: usize, _: usize| seen.lock().unwrap().push(used);
    let allocator =
        UncheckedStackAllocator::with_reporter(64, StackConfig::production(), &reporter).unwrap();

    unsafe {
        let block = allocator.allocate_block(16, 8);
        allocator.deallocate_block(block);
    }
    drop(allocator);
    assert_eq!(*seen.lock().unwrap(), vec![16, 0]);
}

#[test]
fn test_statistics() {
    let allocator = StackAllocator::<DefaultPolicy>::debug(1024).unwrap();
    unsafe {
        let a = allocator.allocate(64, 8);
        let b = allocator.allocate(64, 8);
        let peak = allocator.used_size();
        allocator.deallocate(b.as_ptr());
        allocator.deallocate(a.as_ptr());
        allocator.reset();

        let stats = allocator.statistics();
        assert_eq!(stats.allocation_count, 2);
        assert_eq!(stats.deallocation_count, 2);
        assert_eq!(stats.reset_count, 1);
        assert_eq!(stats.peak_used_bytes, peak);
        assert_eq!(stats.live_allocations(), 0);
        assert_eq!(stats.total_bytes, 1024);
    }

    allocator.clear_statistics();
    assert_eq!(allocator.statistics().allocation_count, 0);

    let quiet = StackAllocator::<DefaultPolicy>::production(1024).unwrap();
    unsafe {
        let block = quiet.allocate_block(8, 8);
        quiet.deallocate_block(block);
    }
    assert_eq!(quiet.statistics().allocation_count, 0);
}

#[test]
fn test_debug_fill_patterns() {
    let allocator = StackAllocator::<DefaultPolicy>::debug(256).unwrap();
    unsafe {
        let ptr = allocator.allocate(16, 8);
        assert!((0..16).all(|i| *ptr.as_ptr().add(i) == 0xCC));

        allocator.deallocate(ptr.as_ptr());
        assert!((0..16).all(|i| *ptr.as_ptr().add(i) == 0xDD));
    }
}

#[test]
fn test_invalid_construction() {
    let error = StackAllocator::new(0).unwrap_err();
    assert_eq!(error.code(), "STACK:CONFIG");

    let config = StackConfig::default().with_alignment(24);
    let error = StackAllocator::<DefaultPolicy>::with_config(64, config).unwrap_err();
    assert_eq!(error.code(), "STACK:CONFIG");
}

#[test]
fn test_introspection() {
    let allocator = ThreadSafeStackAllocator::with_config(
        2 * KB,
        StackConfig::default().with_name("render"),
    )
    .unwrap();

    assert_eq!(allocator.total_size(), 2048);
    assert_eq!(allocator.debug_name(), "render");
    assert_eq!(allocator.config().debug_name, "render");
    assert!(allocator.policy().thread_safe);
    assert!(!allocator.owns(ptr::null()));

    let rendered = format!("{allocator:?}");
    assert!(rendered.contains("render"));
    assert!(rendered.contains("2048"));
}
