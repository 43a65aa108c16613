use kernel_sync::SyncOnceCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Barrier;
use std::thread;

#[test]
fn set_wins_only_once() {
    let cell = SyncOnceCell::new();
    assert_eq!(cell.get(), None);

    assert_eq!(cell.set(7), Ok(()));
    assert_eq!(cell.get(), Some(&7));

    // A second write is rejected and hands the value back.
    assert_eq!(cell.set(8), Err(8));
    assert_eq!(cell.get(), Some(&7));
}

#[test]
fn get_or_init_returns_the_existing_value() {
    let cell = SyncOnceCell::new();
    assert_eq!(*cell.get_or_init(|| 1), 1);
    assert_eq!(*cell.get_or_init(|| 2), 1);
}

#[test]
fn racing_initializers_run_exactly_one_closure() {
    let threads = 8;
    let cell = SyncOnceCell::new();
    let runs = AtomicUsize::new(0);
    let start = Barrier::new(threads);

    thread::scope(|s| {
        for t in 0..threads {
            let cell = &cell;
            let runs = &runs;
            let start = &start;
            s.spawn(move || {
                start.wait();
                let got = *cell.get_or_init(|| {
                    runs.fetch_add(1, Ordering::SeqCst);
                    t
                });
                // Whatever thread won, everyone agrees on its value.
                assert_eq!(got, *cell.get_or_init(|| usize::MAX));
            });
        }
    });

    assert_eq!(runs.load(Ordering::SeqCst), 1);
}
