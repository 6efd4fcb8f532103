use std::cell::RefCell;
use std::hint::black_box;
use std::io::Cursor;
use std::path::Path;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use tempfile::TempDir;

use logdemux::processors::top::{self, TopOptions, TopState};
use logdemux::{parse_record, to_bytes, DemuxConfig, Demultiplexer, LineSource, ReferenceDate};

const SAMPLES: usize = 200;
const PIDS: [u32; 8] = [101, 202, 303, 404, 505, 606, 707, 808];

fn top_batch() -> String {
    let mut text = String::from("timesync: date time is-> Sat Jan 01 23:00:00 UTC 2000 +0000\n");
    for sample in 0..SAMPLES {
        let minute = sample % 60;
        text.push_str(&format!(
            "top - 23:{:02}:00 up 3 days,  4:05,  1 user,  load average: 0.15, 0.10, 0.05\n",
            minute
        ));
        for pid in PIDS {
            text.push_str(&format!(
                "{:>5} {:>6}{:<10}{:>2} {:>3} {:>7} {:>6} {:>6} {} {:>5} {:>4} {:>9} {}\n",
                pid, 1, " root", "20", "0", "1.5g", "204800", "5120", "S", "0.3", "2.1", "12:01.55", "ruby"
            ));
        }
    }
    text
}

fn bench_top_demux(c: &mut Criterion) {
    let text = top_batch();
    let mut group = c.benchmark_group("demux");
    group.throughput(Throughput::Elements(text.lines().count() as u64));
    group.bench_function("top_batch", |b| {
        b.iter(|| {
            let output = TempDir::new().expect("temp dir");
            let options = TopOptions::default();
            let state = RefCell::new(TopState::default());
            let config = top::configure(DemuxConfig::new(output.path()), &options);
            let rules = top::rules(&options, &state).expect("rules");
            let mut demux = Demultiplexer::new(config, rules).expect("demux");
            demux
                .parse_source(LineSource::from_reader(
                    Path::new("bench.log"),
                    Cursor::new(black_box(text.as_bytes())),
                ))
                .expect("parse");
            demux.finish().expect("finish");
        });
    });
    group.finish();
}

fn bench_to_bytes(c: &mut Criterion) {
    c.bench_function("to_bytes_scaled", |b| {
        b.iter(|| black_box(to_bytes(black_box("  1.234g")).unwrap()));
    });
}

fn bench_record_parse(c: &mut Criterion) {
    let payload = "{:PSS=>123456, :RSS=>234567, :Live=>1000, :Old=>500, :state=>:running}";
    c.bench_function("record_parse", |b| {
        b.iter(|| black_box(parse_record(black_box(payload)).unwrap()));
    });
}

fn bench_resolve_time(c: &mut Criterion) {
    let reference = ReferenceDate::parse("Sat Jan 01 23:59:00 UTC 2000 +0000", 0).unwrap();
    c.bench_function("resolve_time", |b| {
        b.iter(|| black_box(reference.resolve_string(black_box("00:01:00"))));
    });
}

criterion_group!(
    demux_benches,
    bench_top_demux,
    bench_to_bytes,
    bench_record_parse,
    bench_resolve_time
);
criterion_main!(demux_benches);
