//! Benchmark: per-launch marshaling cost against the simulated runtime.
//! Run with: cargo bench -p okra-bridge --bench marshal_bench

use okra_bridge::sim::{self, SimOptions, SimResolver};
use okra_bridge::{Bridge, BridgeConfig};
use okra_core::{ArgumentValue, HeapRegion, KernelBinary, KernelSignature, ObjectRef};
use std::time::Instant;

const CODE: &[u8] = b"kernel &bench() {}\0";

fn bench_launch(bridge: &Bridge, sim: &SimResolver, descriptor: &str, args: &[ArgumentValue], iters: usize) -> f64 {
    let sig = KernelSignature::parse(descriptor, true).unwrap();
    let mut kernel = bridge
        .generate_kernel(&KernelBinary::new(CODE, "bench").unwrap())
        .unwrap();

    // warm-up
    bridge.execute_kernel_void_1d(&mut kernel, 256, args, &sig).unwrap();
    sim.take_journal();

    let start = Instant::now();
    for i in 0..iters {
        bridge.execute_kernel_void_1d(&mut kernel, 256, args, &sig).unwrap();
        if i % 1024 == 0 {
            sim.take_journal();
        }
    }
    start.elapsed().as_secs_f64() / iters as f64
}

fn bench_parse(descriptor: &str, iters: usize) -> f64 {
    let start = Instant::now();
    for _ in 0..iters {
        let _ = KernelSignature::parse(descriptor, false).unwrap();
    }
    start.elapsed().as_secs_f64() / iters as f64
}

fn main() {
    println!("=== okra Marshal Benchmark (simulated runtime) ===\n");

    let heap = vec![0u8; 1 << 16];
    let sim = sim::install(SimOptions::default());
    let bridge = Bridge::new(sim.clone(), BridgeConfig::default());
    bridge.initialize_gpu().unwrap();
    bridge.register_heap(&HeapRegion::from_slice(&heap)).unwrap();
    let obj = ObjectRef::from_addr(heap.as_ptr() as usize + 64);

    let cases: Vec<(&str, Vec<ArgumentValue>)> = vec![
        ("()V", vec![]),
        ("(I)V", vec![ArgumentValue::Int(1)]),
        (
            "(IDLjava/lang/Object;Z)V",
            vec![
                ArgumentValue::Int(7),
                ArgumentValue::Double(2.5),
                ArgumentValue::Object(obj),
                ArgumentValue::Boolean(true),
            ],
        ),
        ("([F[F[FIF)V", {
            let mut v = vec![ArgumentValue::Object(obj); 3];
            v.push(ArgumentValue::Int(1024));
            v.push(ArgumentValue::Float(0.5));
            v
        }),
        ("(JJJJJJJJ)V", (0..8).map(|i| ArgumentValue::Long(i)).collect()),
    ];

    let iters = 20_000;
    println!("{:<28} {:>6} {:>14} {:>14}", "Signature", "Args", "Launch (us)", "Parse (us)");
    println!("{}", "-".repeat(66));

    for (descriptor, args) in &cases {
        let launch = bench_launch(&bridge, &sim, descriptor, args, iters);
        let parse = bench_parse(descriptor, iters);
        println!(
            "{:<28} {:>6} {:>14.3} {:>14.3}",
            descriptor,
            args.len(),
            launch * 1e6,
            parse * 1e6
        );
    }
}
