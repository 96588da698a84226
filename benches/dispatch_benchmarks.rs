//! Benchmarks for command dispatch and argument binding.
//!
//! Groups:
//! - `dispatch/functions`: plain, optional, rest and option-taking commands
//! - `dispatch/overloads`: overload resolution by argument count
//! - `dispatch/objects`: constructor, method calls and handle extraction
//!
//! ## Profiling with Puffin
//!
//! ```bash
//! cargo bench --features profile-with-puffin -- --profile-time 5
//! ```

#![allow(clippy::collapsible_if)]

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use tclbind::prelude::*;

#[cfg(feature = "profile-with-puffin")]
use std::collections::HashMap;

#[cfg(feature = "profile-with-puffin")]
static FRAME_VIEW: std::sync::OnceLock<puffin::GlobalFrameView> = std::sync::OnceLock::new();

#[cfg(feature = "profile-with-puffin")]
fn setup_profiler() {
    puffin::set_scopes_on(true);
    FRAME_VIEW.get_or_init(puffin::GlobalFrameView::default);
}

#[cfg(not(feature = "profile-with-puffin"))]
fn setup_profiler() {}

#[cfg(feature = "profile-with-puffin")]
fn end_profiling_frame() {
    puffin::GlobalProfiler::lock().new_frame();
}

#[cfg(not(feature = "profile-with-puffin"))]
fn end_profiling_frame() {}

#[cfg(feature = "profile-with-puffin")]
fn collect_scopes(
    stream: &puffin::Stream,
    scope: &puffin::Scope,
    scope_collection: &puffin::ScopeCollection,
    timings: &mut HashMap<String, i64>,
) {
    use puffin::Reader;

    if let Some(details) = scope_collection.fetch_by_id(&scope.id) {
        *timings.entry(details.name().to_string()).or_insert(0) += scope.record.duration_ns;
    }
    if scope.child_begin_position < scope.child_end_position {
        if let Ok(reader) = Reader::with_offset(stream, scope.child_begin_position) {
            if let Ok(children) = reader.read_top_scopes() {
                for child in children {
                    collect_scopes(stream, &child, scope_collection, timings);
                }
            }
        }
    }
}

/// Print per-scope averages over the recorded frames.
#[cfg(feature = "profile-with-puffin")]
fn print_profiling_stats() {
    use puffin::Reader;

    let Some(frame_view) = FRAME_VIEW.get() else {
        println!("Profiler not initialized");
        return;
    };
    let view = frame_view.lock();
    let scope_collection = view.scope_collection();

    let mut timings: HashMap<String, i64> = HashMap::new();
    let mut frame_count = 0i64;
    for frame in view.recent_frames() {
        frame_count += 1;
        let Ok(unpacked) = frame.unpacked() else {
            continue;
        };
        for (_thread_info, stream_info) in unpacked.thread_streams.iter() {
            let reader = Reader::from_start(&stream_info.stream);
            if let Ok(scopes) = reader.read_top_scopes() {
                for scope in scopes {
                    collect_scopes(&stream_info.stream, &scope, scope_collection, &mut timings);
                }
            }
        }
    }

    println!("\n=== Dispatch profile ({frame_count} frames) ===");
    let mut entries: Vec<_> = timings.into_iter().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    for (name, ns) in entries {
        let avg = if frame_count > 0 { ns / frame_count } else { ns };
        println!(
            "  {:40} {:>10.2?} avg",
            name,
            std::time::Duration::from_nanos(avg as u64)
        );
    }
}

#[cfg(not(feature = "profile-with-puffin"))]
fn print_profiling_stats() {}

struct Particle {
    x: f64,
    v: f64,
}

fn bench_interp() -> Interpreter {
    let interp = Interpreter::new();
    interp.def("add", |a: i64, b: i64| a + b).unwrap();
    interp
        .def("scaled", |a: f64, k: Opt<f64>| a * k.unwrap_or(2.0))
        .unwrap();
    interp
        .def("sum", |items: Rest<i64>| -> Result<i64, ConversionError> {
            items.iter().sum()
        })
        .unwrap();
    interp
        .def_with(
            "pad",
            |width: Getopt<i64>, text: String| {
                let width = width.unwrap_or(0) as usize;
                format!("{text:>width$}")
            },
            options("width=8"),
        )
        .unwrap();
    interp.def_overload("area", |r: f64| std::f64::consts::PI * r * r).unwrap();
    interp.def_overload("area", |w: f64, h: f64| w * h).unwrap();
    interp
        .def_overload("area", |a: f64, b: f64, c: f64| {
            let s = (a + b + c) / 2.0;
            (s * (s - a) * (s - b) * (s - c)).sqrt()
        })
        .unwrap();
    interp
        .class::<Particle>("Particle")
        .unwrap()
        .constructor(|x: f64, v: f64| Particle { x, v })
        .unwrap()
        .method("step", |p: &mut Particle, dt: f64| {
            p.x += p.v * dt;
            p.x
        })
        .unwrap();
    interp.def("position", |p: Handle<Particle>| p.borrow().x).unwrap();
    interp
}

fn function_benchmarks(c: &mut Criterion) {
    setup_profiler();
    let interp = bench_interp();

    let mut group = c.benchmark_group("dispatch/functions");
    group.throughput(Throughput::Elements(1));

    group.bench_function("two_ints", |b| {
        b.iter(|| {
            let result = interp.eval(black_box("add 40 2")).unwrap();
            end_profiling_frame();
            black_box(result)
        });
    });
    group.bench_function("optional_default", |b| {
        b.iter(|| black_box(interp.eval(black_box("scaled 1.5")).unwrap()));
    });
    group.bench_function("rest_eight", |b| {
        b.iter(|| black_box(interp.eval(black_box("sum 1 2 3 4 5 6 7 8")).unwrap()));
    });
    group.bench_function("getopt", |b| {
        b.iter(|| black_box(interp.eval(black_box("pad -width 12 hello")).unwrap()));
    });
    group.bench_function("arity_error", |b| {
        b.iter(|| black_box(interp.eval(black_box("add 1")).unwrap_err()));
    });
    group.finish();
    print_profiling_stats();
}

fn overload_benchmarks(c: &mut Criterion) {
    let interp = bench_interp();
    let mut group = c.benchmark_group("dispatch/overloads");
    for (name, script) in [
        ("first", "area 2"),
        ("second", "area 2 3"),
        ("third", "area 3 4 5"),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| black_box(interp.eval(black_box(script)).unwrap()));
        });
    }
    group.finish();
}

fn object_benchmarks(c: &mut Criterion) {
    let interp = bench_interp();
    interp.eval("set p [Particle 0 1]").unwrap();

    let mut group = c.benchmark_group("dispatch/objects");
    group.bench_function("construct_delete", |b| {
        b.iter(|| {
            let obj = interp.eval("Particle 1 2").unwrap();
            interp.eval(&format!("{} -delete", obj.as_string())).unwrap();
        });
    });
    group.bench_function("method_call", |b| {
        b.iter(|| black_box(interp.eval(black_box("$p step 0.5")).unwrap()));
    });
    group.bench_function("handle_argument", |b| {
        b.iter(|| black_box(interp.eval(black_box("position $p")).unwrap()));
    });
    group.finish();
}

criterion_group!(
    benches,
    function_benchmarks,
    overload_benchmarks,
    object_benchmarks
);
criterion_main!(benches);
