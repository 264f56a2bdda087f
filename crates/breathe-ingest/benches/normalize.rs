use breathe_ingest::normalize::{clean_text, fix_mojibake};

fn abstracts() -> Vec<String> {
    (0..1000)
        .map(|i| {
            format!(
                "Exposure to PM2.5 (≥ {i} µg/m³) and ozone was associated with \
                 asthma exacerbations in the patientâ€™s cohort; naïve models \
                 underestimated risk by 10–20% — see “Methods” &amp; Table {i}."
            )
        })
        .collect()
}

#[divan::bench]
fn clean_abstracts(bencher: divan::Bencher) {
    let texts = abstracts();
    bencher.bench(|| {
        for text in &texts {
            divan::black_box(clean_text(Some(text)));
        }
    });
}

#[divan::bench]
fn mojibake_only(bencher: divan::Bencher) {
    let texts = abstracts();
    bencher.bench(|| {
        for text in &texts {
            divan::black_box(fix_mojibake(text));
        }
    });
}

fn main() {
    divan::main();
}
