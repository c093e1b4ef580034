use criterion::{Criterion, black_box, criterion_group, criterion_main};
use ner_transfer_core::{AnnotatedSentence, Sentence, convert, convert_corpus, score};

fn sample_corpus() -> Vec<Sentence> {
    let sentences: [&[(&str, &str)]; 4] = [
        &[
            ("Mette", "B-PER"),
            ("Frederiksen", "I-PER"),
            ("besøgte", "O"),
            ("Aarhus", "B-LOC"),
            ("Universitet", "I-LOC"),
            ("i", "O"),
            ("går", "O"),
        ],
        &[
            ("Novo", "B-ORG"),
            ("Nordisk", "I-ORG"),
            ("har", "O"),
            ("hovedsæde", "O"),
            ("i", "O"),
            ("Bagsværd", "B-LOC"),
        ],
        &[("Det", "O"), ("regner", "O"), ("igen", "O")],
        &[("Kierkegaard", "B-PER"), ("skrev", "O"), ("Enten-Eller", "B-MISC")],
    ];
    sentences
        .iter()
        .cycle()
        .take(1000)
        .map(|pairs| Sentence::from(*pairs))
        .collect()
}

fn bench_convert(c: &mut Criterion) {
    let corpus = sample_corpus();

    c.bench_function("convert_single", |b| {
        b.iter(|| convert(black_box(&corpus[0])));
    });

    c.bench_function("convert_corpus_1000", |b| {
        b.iter(|| convert_corpus(black_box(&corpus)));
    });
}

fn bench_score(c: &mut Criterion) {
    let gold = convert_corpus(&sample_corpus());
    let system: Vec<AnnotatedSentence> = gold
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let mut s = s.clone();
            if i % 3 == 0 {
                s.entities.pop();
            }
            s
        })
        .collect();

    c.bench_function("score_1000", |b| {
        b.iter(|| score(black_box(&system), black_box(&gold)));
    });
}

criterion_group!(benches, bench_convert, bench_score);
criterion_main!(benches);
