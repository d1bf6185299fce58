use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use diabetes_dashboard::data::model::Record;
use parquet::arrow::ArrowWriter;

const AGE_GROUPS: [(&str, f64); 5] = [
    ("0-18", 0.12),
    ("18-35", 0.22),
    ("35-50", 0.22),
    ("50-65", 0.24),
    ("65+", 0.20),
];
const SMOKING: [(&str, f64); 6] = [
    ("never", 0.36),
    ("No Info", 0.35),
    ("former", 0.09),
    ("current", 0.09),
    ("not current", 0.07),
    ("ever", 0.04),
];

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Pick from `(item, weight)` pairs whose weights sum to ~1.
    fn weighted<'a>(&mut self, items: &[(&'a str, f64)]) -> &'a str {
        let mut r = self.next_f64();
        for (item, w) in items {
            if r < *w {
                return *item;
            }
            r -= w;
        }
        items[items.len() - 1].0
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

fn generate_record(rng: &mut SimpleRng) -> Record {
    let gender = if rng.chance(0.58) { "Female" } else { "Male" };
    let age_group = rng.weighted(&AGE_GROUPS);
    let smoking_history = rng.weighted(&SMOKING);

    // Risk factors rise with age.
    let age_risk = match age_group {
        "0-18" => 0.0,
        "18-35" => 0.1,
        "35-50" => 0.3,
        "50-65" => 0.6,
        _ => 1.0,
    };
    let hypertension = rng.chance(0.02 + 0.2 * age_risk);
    let heart_disease = rng.chance(0.01 + 0.1 * age_risk);

    let mut p_diabetes = 0.01 + 0.15 * age_risk;
    if hypertension {
        p_diabetes += 0.12;
    }
    if heart_disease {
        p_diabetes += 0.10;
    }
    if gender == "Male" {
        p_diabetes += 0.02;
    }
    if matches!(smoking_history, "current" | "former") {
        p_diabetes += 0.03;
    }
    let diabetes = rng.chance(p_diabetes);

    let hba1c = if diabetes {
        rng.gauss(6.9, 1.1)
    } else {
        rng.gauss(5.4, 0.9)
    };

    Record {
        gender: gender.to_string(),
        age_group: age_group.to_string(),
        smoking_history: smoking_history.to_string(),
        hypertension,
        heart_disease,
        hba1c_level: (hba1c.clamp(3.5, 9.0) * 10.0).round() / 10.0,
        diabetes,
    }
}

fn write_csv(path: &Path, records: &[Record]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).context("creating CSV file")?;
    for rec in records {
        writer.serialize(rec).context("writing CSV row")?;
    }
    writer.flush().context("flushing CSV file")?;
    Ok(())
}

fn to_batch(records: &[Record]) -> Result<RecordBatch> {
    let text = |f: fn(&Record) -> &str| -> ArrayRef {
        Arc::new(StringArray::from(records.iter().map(f).collect::<Vec<_>>()))
    };
    let flag = |f: fn(&Record) -> bool| -> ArrayRef {
        Arc::new(Int64Array::from(
            records.iter().map(|r| i64::from(f(r))).collect::<Vec<_>>(),
        ))
    };

    let schema = Arc::new(Schema::new(vec![
        Field::new("gender", DataType::Utf8, false),
        Field::new("age_group", DataType::Utf8, false),
        Field::new("smoking_history", DataType::Utf8, false),
        Field::new("hypertension", DataType::Int64, false),
        Field::new("heart_disease", DataType::Int64, false),
        Field::new("HbA1c_level", DataType::Float64, false),
        Field::new("diabetes", DataType::Int64, false),
    ]));

    let batch = RecordBatch::try_new(
        schema,
        vec![
            text(|r| r.gender.as_str()),
            text(|r| r.age_group.as_str()),
            text(|r| r.smoking_history.as_str()),
            flag(|r| r.hypertension),
            flag(|r| r.heart_disease),
            Arc::new(Float64Array::from(
                records.iter().map(|r| r.hba1c_level).collect::<Vec<_>>(),
            )),
            flag(|r| r.diabetes),
        ],
    )?;
    Ok(batch)
}

fn write_parquet(path: &Path, batch: &RecordBatch) -> Result<()> {
    let file = std::fs::File::create(path).context("creating Parquet file")?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let output = args.next().unwrap_or_else(|| "diabetes_clean.csv".to_string());
    let n_rows: usize = match args.next() {
        Some(n) => n.parse().with_context(|| format!("'{n}' is not a row count"))?,
        None => 2000,
    };

    let mut rng = SimpleRng::new(42);
    let records: Vec<Record> = (0..n_rows).map(|_| generate_record(&mut rng)).collect();
    let batch = to_batch(&records)?;

    let path = Path::new(&output);
    match path.extension().and_then(|e| e.to_str()) {
        Some("parquet") | Some("pq") => write_parquet(path, &batch)?,
        _ => write_csv(path, &records)?,
    }

    arrow::util::pretty::print_batches(&[batch.slice(0, n_rows.min(5))])?;
    println!("Wrote {n_rows} patient records to {output}");
    Ok(())
}
