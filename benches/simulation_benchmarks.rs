use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use SchemSim::*;

/// `stages` NPN stages, each output wired into the next stage's reference pin
fn npn_ladder(stages: usize) -> Schematic {
    let mut schematic = Schematic::new(format!("{} stage ladder", stages));
    schematic.elements.push(Element::new("el1", ElementType::Power));
    schematic.elements.push(Element::new("el2", ElementType::Ground));

    let mut previous = PinRef::new("el1", 0);
    for stage in 0..stages {
        let id = format!("el{}", stage + 3);
        schematic.elements.push(Element::new(id.clone(), ElementType::Npn));
        schematic
            .connections
            .push(Connection::new(PinRef::new("el2", 0), PinRef::new(id.clone(), 0)));
        schematic
            .connections
            .push(Connection::new(previous, PinRef::new(id.clone(), 1)));
        previous = PinRef::new(id, 2);
    }

    // Reverse so that later stages are visited first
    schematic.connections.reverse();
    schematic
}

fn bench_node_building(c: &mut Criterion) {
    let mut group = c.benchmark_group("node_builder");

    for stages in [10, 50, 100, 200].iter() {
        let schematic = npn_ladder(*stages);
        group.bench_with_input(BenchmarkId::new("build_nodes", stages), stages, |b, _| {
            b.iter(|| build_nodes(&schematic.connections));
        });
    }

    group.finish();
}

fn bench_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolver");

    for stages in [10, 50, 100].iter() {
        let schematic = npn_ladder(*stages);
        group.bench_with_input(BenchmarkId::new("fixed_point", stages), stages, |b, _| {
            b.iter(|| compute_simulation(&schematic.elements, &schematic.connections, &[]).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("single_pass", stages), stages, |b, _| {
            b.iter(|| {
                compute_simulation_with(
                    &schematic.elements,
                    &schematic.connections,
                    &[],
                    ResolverConfig::reference(),
                )
                .unwrap()
            });
        });
    }

    group.finish();
}

fn bench_truth_table(c: &mut Criterion) {
    let mut group = c.benchmark_group("truth_table");

    let netlist = r#"
Eight inputs into one output
el1 input
el2 input
el3 input
el4 input
el5 input
el6 input
el7 input
el8 input
el9 output
el10 pnp
el11 power
wire el11:0 el10:0
wire el1:0 el10:1
wire el10:2 el9:0
.end
"#;

    let parser = SchematicParser::new();
    let schematic = parser.parse_netlist(netlist).unwrap();

    group.bench_function("eight_inputs", |b| {
        b.iter(|| {
            TruthTable::build(
                &schematic,
                ResolverConfig::default(),
                &schematic.options,
                8,
            )
            .unwrap()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_node_building, bench_resolution, bench_truth_table);
criterion_main!(benches);
