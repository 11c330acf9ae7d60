use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use themestack::chain::ThemeChain;
use themestack::copier::copy_sources;
use themestack::location::Locator;
use themestack::manifest::discover;
use themestack::paths::WatchPathSet;
use themestack::scripts::ScriptConfig;
use themestack::sources::{merge_asset_streams, WalkSource};
use themestack::styles::StyleConfig;

/// Create a theme directory with N asset files
fn create_theme(root: &Path, name: &str, count: usize) -> PathBuf {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("robots.txt"), name).unwrap();

    for i in 0..count {
        let subdir = dir.join("assets").join(format!("dir{}", i % 10));
        fs::create_dir_all(&subdir).unwrap();
        fs::write(subdir.join(format!("file{}.txt", i)), format!("content {}", i)).unwrap();
    }

    dir
}

/// Benchmark listing and copying the merged assets of a child and parent
fn bench_copy_assets(c: &mut Criterion) {
    let mut group = c.benchmark_group("copy_assets");

    for file_count in [100, 500, 1000].iter() {
        let temp = TempDir::new().unwrap();
        let parent = create_theme(temp.path(), "parent", *file_count);
        let child = create_theme(temp.path(), "child", *file_count / 2);
        let chain = ThemeChain::inherit(child, Some(&ThemeChain::leaf(parent)));
        let dst = temp.path().join("dist");

        group.throughput(Throughput::Elements(*file_count as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(file_count),
            file_count,
            |b, _| {
                b.iter(|| {
                    let _ = fs::remove_dir_all(&dst);
                    let sources =
                        merge_asset_streams(&WalkSource::default(), black_box(&chain)).unwrap();
                    copy_sources(sources, black_box(&dst)).unwrap()
                })
            },
        );
    }

    group.finish();
}

/// Benchmark the per-chain builders on a five level chain
fn bench_chain_builders(c: &mut Criterion) {
    let chain = (0..5).rev().fold(None, |parent: Option<ThemeChain>, i| {
        Some(ThemeChain::inherit(
            PathBuf::from(format!("/themes/level{}", i)),
            parent.as_ref(),
        ))
    });
    let chain = chain.unwrap();

    c.bench_function("watch_paths_5", |b| {
        b.iter(|| WatchPathSet::for_chain(black_box(&chain)))
    });
    c.bench_function("style_config_5", |b| {
        b.iter(|| StyleConfig::for_chain(black_box(&chain)))
    });
    c.bench_function("script_config_5", |b| {
        b.iter(|| ScriptConfig::for_chain(black_box(&chain), false))
    });
}

/// Benchmark manifest discovery through a five level chain
fn bench_manifest_discovery(c: &mut Criterion) {
    let temp = TempDir::new().unwrap();

    for i in 0..5 {
        let theme_dir = temp.path().join(format!("theme{}", i));
        fs::create_dir_all(&theme_dir).unwrap();

        let parent = if i < 4 {
            format!("<parent>../theme{}</parent>", i + 1)
        } else {
            String::new()
        };
        fs::write(
            theme_dir.join("theme.xml"),
            format!(
                r#"<?xml version="1.0"?>
<theme>
    <title>Theme {}</title>
    {}
</theme>"#,
                i, parent
            ),
        )
        .unwrap();
    }

    let leaf = temp.path().join("theme0");
    let leaf = leaf.to_str().unwrap();
    let locator = Locator::default();

    c.bench_function("discover_manifest_5", |b| {
        b.iter(|| discover(black_box(&locator), black_box(leaf)).unwrap())
    });
}

criterion_group!(
    benches,
    bench_copy_assets,
    bench_chain_builders,
    bench_manifest_discovery,
);
criterion_main!(benches);
