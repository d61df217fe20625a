// Copyright (c) 2025 Felix Kahle.
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the
// "Software"), to deal in the Software without restriction, including
// without limitation the rights to use, copy, modify, merge, publish,
// distribute, sublicense, and/or sell copies of the Software, and to
// permit persons to whom the Software is furnished to do so, subject to
// the following conditions:
//
// The above copyright notice and this permission notice shall be
// included in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
// MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE
// LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION
// OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION
// WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

use bytesparse::{Memory, MemoryConfig, MemoryResult, WideMemory};
use bytesparse_core::Span;
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::Serialize;
use std::{fs::File, io::BufWriter, time::Instant};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

fn enable_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_span_events(FmtSpan::CLOSE)
        .init();
}

#[derive(Debug, Clone, Serialize)]
struct ScenarioResult {
    name: String,
    content: String,
    span: (i128, i128),
    content_size: usize,
    content_parts: usize,
    intervals: Vec<(i128, i128)>,
    notes: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
struct WorkloadResult {
    idx: usize,
    seed: u64,
    operations: usize,
    address_space: u64,
    content_size: usize,
    content_parts: usize,
    elapsed_us: u128,
}

#[derive(Debug, Clone, Serialize)]
struct Report {
    description: String,
    scenarios: Vec<ScenarioResult>,
    workloads: Vec<WorkloadResult>,
}

fn intervals_of(memory: &Memory<u64>) -> Vec<(i128, i128)> {
    memory
        .intervals(..)
        .map(|span: Span<u64>| (span.start() as i128, span.endex() as i128))
        .collect()
}

fn summarize(name: &str, memory: &Memory<u64>, notes: Vec<String>) -> ScenarioResult {
    let (start, endex) = memory.span();
    ScenarioResult {
        name: name.into(),
        content: String::from_utf8_lossy(&memory.to_bytes(..)).into_owned(),
        span: (start as i128, endex as i128),
        content_size: memory.content_size(),
        content_parts: memory.content_parts(),
        intervals: intervals_of(memory),
        notes,
    }
}

fn greeting() -> MemoryResult<ScenarioResult, u64> {
    let mut memory = Memory::<u64>::from_bytes(b"Hello, World!", 0)?;
    memory.extend(b"!!")?;
    memory.replace(0..5, b"Ciao")?;
    memory.clear(4..6)?;
    let notes = vec![format!("find(World) = {:?}", memory.find(b"World", ..))];
    Ok(summarize("greeting", &memory, notes))
}

fn bounded_flood() -> MemoryResult<ScenarioResult, u64> {
    let mut memory = Memory::<u64>::from_blocks(
        [(4, b"ABC".to_vec()), (9, b"xy".to_vec())],
        Some(2),
        Some(15),
    )?;
    let mut notes = vec![
        format!("content_span = {:?}", memory.content_span()),
        format!("len = {}", memory.len()),
    ];
    let filled = memory.flood_backup(.., b".")?;
    notes.push(format!("flooded gaps = {}", filled.len()));
    Ok(summarize("bounded_flood", &memory, notes))
}

fn pinned_view() -> MemoryResult<ScenarioResult, u64> {
    let mut memory = Memory::<u64>::from_bytes(b"Hello, World!", 0)?;
    let view = memory.view(1..8)?;
    let mut notes = vec![format!(
        "view = {:?}",
        String::from_utf8_lossy(memory.view_bytes(&view)?)
    )];
    if let Err(err) = memory.insert(3, b"--") {
        notes.push(format!("insert while pinned: {} ({})", err, err.kind()));
    }
    memory.release(&view)?;
    if let Err(err) = memory.view_bytes(&view) {
        notes.push(format!("after release: {}", err.kind()));
    }
    memory.insert(3, b"--")?;
    Ok(summarize("pinned_view", &memory, notes))
}

fn negative_addresses() -> MemoryResult<ScenarioResult, i128> {
    let mut memory = WideMemory::from_bytes(b"abc", 0)?;
    memory.shift(-1_000)?;
    memory.insert(-2_000, b"z")?;
    let (start, endex) = memory.span();
    Ok(ScenarioResult {
        name: "negative_addresses".into(),
        content: String::from_utf8_lossy(&memory.to_bytes(..)).into_owned(),
        span: (start, endex),
        content_size: memory.content_size(),
        content_parts: memory.content_parts(),
        intervals: memory.intervals(..).map(|s| (s.start(), s.endex())).collect(),
        notes: Vec::new(),
    })
}

// Random mix of writes, clears, inserts and deletes over a growing address space.
fn run_workload(idx: usize, seed: u64, operations: usize, space: u64) -> WorkloadResult {
    let config = MemoryConfig::default().with_check_invariants(false);
    let mut memory = Memory::<u64>::with_config(config).expect("valid memory config");
    let mut rng = StdRng::seed_from_u64(seed);
    let payload = [0x5Au8; 64];

    let t0 = Instant::now();
    for _ in 0..operations {
        let start = rng.random_range(0..space);
        let len = rng.random_range(1..=64usize);
        let result = match rng.random_range(0..4) {
            0 | 1 => memory.write(start, &payload[..len]),
            2 => memory.clear(start..start + len as u64),
            _ if rng.random_bool(0.5) => memory.insert(start, &payload[..len]),
            _ => memory.delete(start..start + len as u64),
        };
        if let Err(err) = result {
            warn!(%err, "workload operation failed");
        }
    }
    let elapsed = t0.elapsed();

    if let Err(err) = memory.validate() {
        warn!(%err, idx, "workload left an invalid memory");
    }
    WorkloadResult {
        idx,
        seed,
        operations,
        address_space: space,
        content_size: memory.content_size(),
        content_parts: memory.content_parts(),
        elapsed_us: elapsed.as_micros(),
    }
}

fn main() {
    enable_tracing();

    let mut scenarios = Vec::new();
    for scenario in [greeting, bounded_flood, pinned_view] {
        match scenario() {
            Ok(result) => scenarios.push(result),
            Err(err) => warn!(%err, "scenario failed"),
        }
    }
    match negative_addresses() {
        Ok(result) => scenarios.push(result),
        Err(err) => warn!(%err, "scenario failed"),
    }
    for scenario in &scenarios {
        info!(name = %scenario.name, parts = scenario.content_parts, "{:?}", scenario.content);
    }

    let n_workloads = 8usize;
    let workloads: Vec<WorkloadResult> = (0..n_workloads)
        .map(|i| {
            let operations = 1_000 << i;
            let space = 4_096u64 << i;
            let result = run_workload(i, 42 + i as u64, operations, space);
            info!(
                idx = i,
                parts = result.content_parts,
                elapsed_us = result.elapsed_us as u64,
                "workload done"
            );
            result
        })
        .collect();

    let report = Report {
        description: "Sparse memory walkthroughs and random workloads from small to big.".into(),
        scenarios,
        workloads,
    };

    let file = File::create("bytesparse_report.json").expect("create bytesparse_report.json");
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &report).expect("write json report");

    println!();
    println!("Wrote: bytesparse_report.json");
}
