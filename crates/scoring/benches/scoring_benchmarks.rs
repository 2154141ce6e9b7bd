use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::{Duration, TimeZone, Utc};
use trustscore_core::{UserId, UserSnapshot};
use trustscore_scoring::compute_score;

fn population(size: usize) -> Vec<UserSnapshot> {
    let reference = Utc.with_ymd_and_hms(2025, 12, 24, 0, 0, 0).unwrap();
    (0..size)
        .map(|i| {
            let i = i as i64;
            UserSnapshot {
                photos: i % 9,
                bio_present: i % 2 == 0,
                interests_count: i % 4,
                selfie_verified: i % 3 == 0,
                id_verified: i % 5 == 0,
                login_streak_days: i % 45,
                response_rate_pct: (i * 7) % 110,
                reports_received: i % 7,
                last_active_at: (i % 4 != 0)
                    .then(|| (reference - Duration::days(i % 60)).to_rfc3339()),
                ..UserSnapshot::new(UserId::new(format!("user_{i}")).unwrap())
            }
        })
        .collect()
}

fn bench_compute_score(c: &mut Criterion) {
    let reference = Utc.with_ymd_and_hms(2025, 12, 24, 0, 0, 0).unwrap();
    let mut group = c.benchmark_group("compute_score");

    for size in [1usize, 100, 10_000] {
        let users = population(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &users, |b, users| {
            b.iter(|| {
                for user in users {
                    black_box(compute_score(black_box(user), reference));
                }
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_compute_score);
criterion_main!(benches);
