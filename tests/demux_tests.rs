//! Library-level tests of pairing, segmentation and the cache working together.

use std::io::{Read, Write};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::TempDir;

use float_demux::database::cache::{compile_or_load, PatternCache};
use float_demux::demux::pairing::{PairState, PairedRecords};
use float_demux::demux::routes::RoutePool;
use float_demux::demux::DemuxError;
use float_demux::parsing::fastq::open_fastq;
use float_demux::utils::interrupt::InterruptFlag;
use float_demux::{DemuxConfig, Demultiplexer, OutputMode, PatternScanner, TrimFlags};

fn fastq(n: usize, seq: &str) -> String {
    (1..=n)
        .map(|i| format!("@read{i}\n{seq}\n+\n{}\n", "I".repeat(seq.len())))
        .collect()
}

fn write_gz(path: &Path, text: &str) {
    let mut encoder = GzEncoder::new(std::fs::File::create(path).unwrap(), Compression::default());
    encoder.write_all(text.as_bytes()).unwrap();
    encoder.finish().unwrap();
}

fn read_gz(path: &Path) -> String {
    let mut text = String::new();
    MultiGzDecoder::new(std::fs::File::open(path).unwrap())
        .read_to_string(&mut text)
        .unwrap();
    text
}

#[test]
fn test_cache_round_trip_reports_identical_spans() {
    let dir = TempDir::new().unwrap();
    let patterns = dir.path().join("barcodes.txt");
    std::fs::write(&patterns, "10:/ACGT/i\n20:/T{3,}/\n30:/GG/H\n").unwrap();

    let compiled = compile_or_load(&patterns, false).unwrap();
    let cached = compile_or_load(&patterns, false).unwrap();
    assert!(PatternCache::for_pattern_file(&patterns)
        .unwrap()
        .cache_path()
        .is_file());

    for buffer in [&b"ggACGTccTTTTGGaaGG\n"[..], &b"acgtacgt\n"[..], &b"NNNN\n"[..]] {
        let a: Vec<_> = compiled.scan(buffer).collect();
        let b: Vec<_> = cached.scan(buffer).collect();
        assert_eq!(a, b);
    }
}

#[test]
fn test_gzipped_pairs_of_equal_length() {
    let dir = TempDir::new().unwrap();
    let r1 = dir.path().join("lib_R1.fastq.gz");
    let r2 = dir.path().join("lib_R2.fastq.gz");
    write_gz(&r1, &fastq(50, "ACGTACGT"));
    write_gz(&r2, &fastq(50, "TTTTCCCC"));

    let mut pairs = PairedRecords::new(open_fastq(&r1).unwrap(), open_fastq(&r2).unwrap());
    let mut n = 0;
    for pair in pairs.by_ref() {
        let (a, b) = pair.unwrap();
        assert_eq!(&*a.source_label, "lib_R1");
        assert_eq!(&*b.source_label, "lib_R2");
        n += 1;
    }
    assert_eq!(n, 50);
    assert_eq!(pairs.state(), PairState::Complete);
}

#[test]
fn test_uneven_pairs_fail_at_shorter_end() {
    let dir = TempDir::new().unwrap();
    let r1 = dir.path().join("lib_R1.fastq");
    let r2 = dir.path().join("lib_R2.fastq");
    std::fs::write(&r1, fastq(5, "ACGT")).unwrap();
    std::fs::write(&r2, fastq(4, "ACGT")).unwrap();

    let results: Vec<_> =
        PairedRecords::new(open_fastq(&r1).unwrap(), open_fastq(&r2).unwrap()).collect();
    assert_eq!(results.len(), 5);
    assert!(results[..4].iter().all(Result::is_ok));
    assert!(matches!(results[4], Err(DemuxError::Pairing(_))));
}

#[test]
fn test_structured_run_with_trimmed_left_flank() {
    let dir = TempDir::new().unwrap();
    let patterns = dir.path().join("barcodes.txt");
    std::fs::write(&patterns, "1:/ACGT/\n").unwrap();
    let r1 = dir.path().join("lib_R1.fastq");
    let r2 = dir.path().join("lib_R2.fastq");
    std::fs::write(&r1, fastq(3, "ggACGTcc")).unwrap();
    std::fs::write(&r2, fastq(3, "gggggggg")).unwrap();

    let database = compile_or_load(&patterns, false).unwrap();
    let config = DemuxConfig {
        trim: TrimFlags {
            left: true,
            ..TrimFlags::default()
        },
        mode: OutputMode::Structured,
        output_dir: dir.path().to_path_buf(),
        ..DemuxConfig::default()
    };
    let pool = RoutePool::new(config.route_options(), std::io::sink());
    let demux = Demultiplexer::new(&database, config.segmenter(), &pool);

    let mut pairs = PairedRecords::new(open_fastq(&r1).unwrap(), open_fastq(&r2).unwrap());
    let stats = demux
        .run_paired(&mut pairs, &InterruptFlag::new(), None)
        .unwrap();
    assert_eq!(stats.pairs, 3);
    assert_eq!(stats.matches, 3);

    let report = pool.finish().unwrap();
    assert_eq!(report.routes.len(), 1);
    assert_eq!(report.routes[0].summary.records, 3);

    let text = read_gz(&dir.path().join("lib_R1.1.demux.fastq.gz"));
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 12);
    assert_eq!(&lines[..4], ["@read1", "ACGTcc", "+read1 1:2-6 ACGT", "IIIIII"]);
}
