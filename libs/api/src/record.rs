use std::cmp::Ordering;

// ════════════════════════════════════════════════════════════════
//  RecordKey
// ════════════════════════════════════════════════════════════════

/// Составной ключ записи = имя файла `"<ts_ms>-<serial>"`.
///
/// `serial` растёт только внутри одной миллисекунды, поэтому порядок
/// ключей `(ts_ms, serial)` совпадает с порядком поступления.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    pub ts_ms: i64,
    pub serial: u32,
}

impl RecordKey {
    pub fn new(ts_ms: i64, serial: u32) -> Self {
        Self { ts_ms, serial }
    }

    /// Разобрать имя файла. `None` — файл не является записью.
    pub fn parse(name: &str) -> Option<Self> {
        let (ts, serial) = name.split_once('-')?;
        if ts.is_empty() || !ts.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        if serial.is_empty() || !serial.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(Self {
            ts_ms: ts.parse().ok()?,
            serial: serial.parse().ok()?,
        })
    }
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.ts_ms, self.serial)
    }
}

/// Порядок имён файлов в директории source'а.
///
/// Записи сравниваются по ключу (числово), поэтому `…-2` идёт раньше `…-10`.
/// Посторонние имена — после всех записей, по строке.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    match (RecordKey::parse(a), RecordKey::parse(b)) {
        (Some(ka), Some(kb)) => ka.cmp(&kb),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}
