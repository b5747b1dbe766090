use chrono::NaiveDate;
use lending_analytics::model::{FictionFlag, Record};
use lending_analytics::store::RecordStore;

/// Captures tracing output for tests.
#[allow(dead_code)]
pub struct TestTracing {
    buffer: std::sync::Arc<std::sync::Mutex<Vec<u8>>>,
}

#[allow(dead_code)]
impl TestTracing {
    pub fn new() -> Self {
        Self {
            buffer: std::sync::Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.buffer.clone();
        let make_writer = move || TestWriter(writer.clone());
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .without_time()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(make_writer)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn output(&self) -> String {
        let buf = self.buffer.lock().unwrap();
        String::from_utf8_lossy(&buf).to_string()
    }

    /// Assert that the captured log output contains the provided substring.
    pub fn assert_contains(&self, needle: &str) {
        let out = self.output();
        assert!(
            out.contains(needle),
            "expected logs to contain `{needle}`, got:\n{out}"
        );
    }
}

struct TestWriter(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for TestWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut guard = self.0.lock().unwrap();
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Builder for normalized records with sensible defaults.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    record: Record,
}

#[allow(dead_code)]
impl RecordBuilder {
    pub fn new(title: &str) -> Self {
        Self {
            record: Record {
                title: format!("id-{title}"),
                native_name: title.to_string(),
                author: "Anon".into(),
                publisher: "House".into(),
                subject: "General".into(),
                media_type: "Ebook".into(),
                publication_date: NaiveDate::from_ymd_opt(2018, 6, 1),
                transaction_year: 2020,
                rank: 1,
                fiction: FictionFlag::Unknown,
            },
        }
    }

    pub fn author(mut self, author: &str) -> Self {
        self.record.author = author.into();
        self
    }

    pub fn publisher(mut self, publisher: &str) -> Self {
        self.record.publisher = publisher.into();
        self
    }

    pub fn subject(mut self, subject: &str) -> Self {
        self.record.subject = subject.into();
        self
    }

    pub fn media(mut self, media: &str) -> Self {
        self.record.media_type = media.into();
        self
    }

    pub fn year(mut self, year: i32) -> Self {
        self.record.transaction_year = year;
        self
    }

    pub fn rank(mut self, rank: u32) -> Self {
        self.record.rank = rank;
        self
    }

    pub fn published(mut self, date: Option<NaiveDate>) -> Self {
        self.record.publication_date = date;
        self
    }

    pub fn fiction(mut self, flag: FictionFlag) -> Self {
        self.record.fiction = flag;
        self
    }

    pub fn build(self) -> Record {
        self.record
    }
}

/// Records A, B, C: A(author X, 2020, rank 1), B(Y, 2020, 1), C(X, 2021, 4).
#[allow(dead_code)]
pub fn abc_store() -> RecordStore {
    RecordStore::from_records(vec![
        RecordBuilder::new("A").author("X").year(2020).rank(1).build(),
        RecordBuilder::new("B").author("Y").year(2020).rank(1).build(),
        RecordBuilder::new("C").author("X").year(2021).rank(4).build(),
    ])
}

/// Deterministic synthetic store: `count` records spread over
/// transaction years 2020..=2023 and a handful of authors and media types.
#[allow(dead_code)]
pub fn synthetic_store(count: usize) -> RecordStore {
    const AUTHORS: [&str; 5] = ["Haig", "Rooney", "Ishiguro", "Tan", "Kwan"];
    const MEDIA: [&str; 3] = ["Ebook", "Audiobook", "Magazine"];
    const SUBJECTS: [&str; 4] = ["Fiction", "History", "Science", "Travel"];
    let records = (0..count)
        .map(|i| {
            let date = if i % 7 == 0 {
                None
            } else {
                NaiveDate::from_ymd_opt(2000 + (i % 20) as i32, 1 + (i % 12) as u32, 1)
            };
            RecordBuilder::new(&format!("Title {}", i % 30))
                .author(AUTHORS[i % AUTHORS.len()])
                .publisher(&format!("Pub {}", i % 4))
                .subject(SUBJECTS[i % SUBJECTS.len()])
                .media(MEDIA[i % MEDIA.len()])
                .year(2020 + (i % 4) as i32)
                .rank(1 + (i % 50) as u32)
                .published(date)
                .fiction(if i % 2 == 0 {
                    FictionFlag::Fiction
                } else {
                    FictionFlag::NonFiction
                })
                .build()
        })
        .collect();
    RecordStore::from_records(records)
}
