use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use std::sync::Arc;

use cellarbook_core::{ItemId, LineId, PeriodId};
use cellarbook_infra::{EngineConfig, InMemoryCatalog, StocktakeService};
use cellarbook_stocktake::{
    LinePricing, Movement, MovementType, NewMovement, PeriodRequest, StockCategory, StockItem,
    calculate,
};
use chrono::Utc;
use rust_decimal::Decimal;

fn keg() -> StockItem {
    StockItem {
        id: ItemId::new(),
        sku: "KEG-50L".to_string(),
        name: "Lager keg".to_string(),
        category: StockCategory::Draught,
        container_size: Some(Decimal::from(88)),
        serving_size: Some(Decimal::ONE),
        unit_cost: Decimal::from(120),
        valuation_cost: None,
        menu_price: Some(Decimal::new(550, 2)),
    }
}

fn purchase(quantity: i64) -> NewMovement {
    NewMovement {
        movement_type: MovementType::Purchase,
        quantity: Decimal::new(quantity, 2),
        unit_cost: None,
        reference: None,
        notes: None,
    }
}

fn ledger(line_id: LineId, n: usize) -> Vec<Movement> {
    (0..n)
        .map(|i| Movement::record(line_id, purchase(100 + i as i64), Utc::now()).unwrap())
        .collect()
}

/// Full recomputation cost as the movement ledger of one line grows.
fn bench_full_recalculation(c: &mut Criterion) {
    let mut group = c.benchmark_group("line_recalculation");
    let pricing = LinePricing::from_item(&keg()).unwrap();

    for n in [10usize, 100, 1_000, 10_000] {
        let movements = ledger(LineId::new(), n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &movements, |b, movements| {
            b.iter(|| calculate(black_box(Decimal::from(40)), black_box(movements), None, &pricing))
        });
    }
    group.finish();
}

/// End-to-end latency of one `record_movement` against a line with history.
fn bench_record_movement(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_movement");

    for history in [0usize, 100, 1_000] {
        let catalog = Arc::new(InMemoryCatalog::new());
        catalog.upsert_item(keg()).unwrap();
        let service = StocktakeService::in_memory(catalog, EngineConfig::default());
        let period = service
            .create_period(&PeriodRequest::Year { year: 2026 })
            .unwrap();
        service.populate_opening_stock(period.id).unwrap();
        let line_id = service.get_period(period.id).unwrap().lines[0].id;
        for i in 0..history {
            service
                .record_movement(period.id, line_id, purchase(100 + i as i64))
                .unwrap();
        }
        let period_id: PeriodId = period.id;

        group.bench_with_input(BenchmarkId::from_parameter(history), &history, |b, _| {
            b.iter(|| {
                service
                    .record_movement(period_id, line_id, black_box(purchase(125)))
                    .unwrap()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_full_recalculation, bench_record_movement);
criterion_main!(benches);
