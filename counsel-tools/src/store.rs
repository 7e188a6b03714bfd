//! Local legal-practice data store backed by SQLite.
//!
//! Holds cases, attorneys, invoices with line items, and the rate card. All
//! methods are synchronous; handlers call them from
//! `tokio::task::spawn_blocking`. Each call opens its own connection, so the
//! store is cheap to clone and share between handlers.

use chrono::{Datelike, Local};
use counsel_core::records::{AttorneyRecord, CaseRecord, InvoiceItem, InvoiceRecord, LegalRate};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    NotFound(String),
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS attorneys (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    specialty TEXT NOT NULL,
    hourly_rate REAL NOT NULL,
    years_experience INTEGER,
    bar_number TEXT,
    email TEXT,
    phone TEXT,
    available INTEGER NOT NULL DEFAULT 1
);
CREATE TABLE IF NOT EXISTS cases (
    id TEXT PRIMARY KEY,
    case_number TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    type TEXT NOT NULL,
    status TEXT NOT NULL,
    filed_date TEXT,
    attorney_id TEXT REFERENCES attorneys(id),
    client TEXT,
    next_hearing TEXT,
    estimated_value REAL
);
CREATE TABLE IF NOT EXISTS invoices (
    id TEXT PRIMARY KEY,
    invoice_number TEXT NOT NULL UNIQUE,
    invoice_name TEXT,
    client_name TEXT NOT NULL,
    date TEXT,
    due_date TEXT,
    status TEXT NOT NULL,
    total REAL NOT NULL,
    paid_amount REAL NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS invoice_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    invoice_id TEXT NOT NULL REFERENCES invoices(id),
    description TEXT NOT NULL,
    amount REAL NOT NULL,
    UNIQUE (invoice_id, description)
);
CREATE TABLE IF NOT EXISTS legal_rates (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    service TEXT NOT NULL UNIQUE,
    rate REAL NOT NULL,
    unit TEXT NOT NULL DEFAULT 'hour',
    description TEXT
);
";

const CASE_COLUMNS: &str = "id, case_number, title, type, status, filed_date, attorney_id, \
                            client, next_hearing, estimated_value";

const ATTORNEY_COLUMNS: &str = "a.id, a.name, a.specialty, a.hourly_rate, a.years_experience, \
     a.bar_number, a.email, a.phone, a.available, \
     (SELECT COUNT(*) FROM cases c WHERE c.attorney_id = a.id AND c.status = 'Active'), \
     (SELECT COUNT(*) FROM cases c WHERE c.attorney_id = a.id)";

const INVOICE_COLUMNS: &str =
    "id, invoice_number, invoice_name, client_name, date, due_date, status, total, paid_amount";

/// Filters for [`LegalStore::search_cases`]. Status and type match as
/// case-insensitive substrings, the attorney exactly.
#[derive(Debug, Clone, Default)]
pub struct CaseFilter {
    pub status: Option<String>,
    pub case_type: Option<String>,
    pub attorney_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewCase {
    pub title: String,
    pub case_type: String,
    pub client: String,
    pub attorney_id: String,
    pub estimated_value: Option<f64>,
}

/// Fields to change on an existing case. `None` leaves a column untouched.
#[derive(Debug, Clone, Default)]
pub struct CaseUpdate {
    pub status: Option<String>,
    pub next_hearing: Option<String>,
    pub estimated_value: Option<f64>,
}

impl CaseUpdate {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.next_hearing.is_none() && self.estimated_value.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct LegalStore {
    path: PathBuf,
}

impl LegalStore {
    /// Open (creating if needed) the database at `path` and ensure the schema.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let store = Self { path };
        store.connect()?.execute_batch(SCHEMA)?;
        debug!(path = %store.path.display(), "Legal store ready");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(conn)
    }

    /// Insert the demonstration firm: five attorneys, four cases, three
    /// invoices, and the rate card. Existing rows are left alone.
    pub fn seed(&self) -> Result<(), StoreError> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;

        for (id, name, specialty, rate, years, bar, email, phone, available) in SEED_ATTORNEYS {
            tx.execute(
                "INSERT OR IGNORE INTO attorneys
                 (id, name, specialty, hourly_rate, years_experience, bar_number, email, phone, available)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![id, name, specialty, rate, years, bar, email, phone, available],
            )?;
        }
        for (id, number, title, kind, status, filed, attorney, client, hearing, value) in SEED_CASES {
            tx.execute(
                &format!("INSERT OR IGNORE INTO cases ({CASE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"),
                params![id, number, title, kind, status, filed, attorney, client, hearing, value],
            )?;
        }
        for (id, number, name, client, date, due, status, total, paid) in SEED_INVOICES {
            tx.execute(
                &format!("INSERT OR IGNORE INTO invoices ({INVOICE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
                params![id, number, name, client, date, due, status, total, paid],
            )?;
        }
        for (invoice_id, description, amount) in SEED_ITEMS {
            tx.execute(
                "INSERT OR IGNORE INTO invoice_items (invoice_id, description, amount) VALUES (?1, ?2, ?3)",
                params![invoice_id, description, amount],
            )?;
        }
        for (service, rate, description) in SEED_RATES {
            tx.execute(
                "INSERT OR IGNORE INTO legal_rates (service, rate, unit, description) VALUES (?1, ?2, 'hour', ?3)",
                params![service, rate, description],
            )?;
        }

        tx.commit()?;
        info!(path = %self.path.display(), "Seeded legal store");
        Ok(())
    }

    /// Cases matching every given filter, most recently filed first.
    pub fn search_cases(&self, filter: &CaseFilter) -> Result<Vec<CaseRecord>, StoreError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {CASE_COLUMNS} FROM cases
             WHERE (?1 IS NULL OR status LIKE ?1)
               AND (?2 IS NULL OR type LIKE ?2)
               AND (?3 IS NULL OR attorney_id = ?3)
             ORDER BY filed_date DESC"
        ))?;
        let rows = stmt.query_map(
            params![
                filter.status.as_deref().map(like),
                filter.case_type.as_deref().map(like),
                filter.attorney_id,
            ],
            case_from_row,
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// A case by id or case number, with its attorney attached.
    pub fn case(&self, key: &str) -> Result<Option<CaseRecord>, StoreError> {
        let conn = self.connect()?;
        find_case(&conn, key)
    }

    /// Open a new case: `case-xxxxxx` id, next free `<year>-CV-nnnnn` number,
    /// status "New", filed today.
    pub fn create_case(&self, new: &NewCase) -> Result<CaseRecord, StoreError> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;

        if find_attorney(&tx, &new.attorney_id)?.is_none() {
            return Err(StoreError::NotFound(format!(
                "Attorney {} not found",
                new.attorney_id
            )));
        }

        let today = Local::now().date_naive();
        let year = today.year();
        let existing: u32 = tx.query_row(
            "SELECT COUNT(*) FROM cases WHERE case_number LIKE ?1",
            params![format!("{year}-%")],
            |row| row.get(0),
        )?;
        let mut sequence = existing + 1;
        let case_number = loop {
            let candidate = format!("{year}-CV-{sequence:05}");
            let taken: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM cases WHERE case_number = ?1)",
                params![candidate],
                |row| row.get(0),
            )?;
            if !taken {
                break candidate;
            }
            sequence += 1;
        };
        let id = format!("case-{}", &uuid::Uuid::new_v4().simple().to_string()[..6]);

        tx.execute(
            &format!("INSERT INTO cases ({CASE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, 'New', ?5, ?6, ?7, NULL, ?8)"),
            params![
                id,
                case_number,
                new.title,
                new.case_type,
                today.format("%Y-%m-%d").to_string(),
                new.attorney_id,
                new.client,
                new.estimated_value,
            ],
        )?;
        let created = find_case(&tx, &id)?
            .ok_or_else(|| StoreError::NotFound(format!("Case {id} not found")))?;
        tx.commit()?;

        info!(case_id = %created.id, case_number = %created.case_number, "Case created");
        Ok(created)
    }

    /// Apply `update` to the case with this id or number. `None` if no such
    /// case exists.
    pub fn update_case(
        &self,
        key: &str,
        update: &CaseUpdate,
    ) -> Result<Option<CaseRecord>, StoreError> {
        let conn = self.connect()?;
        let changed = conn.execute(
            "UPDATE cases SET
                 status = COALESCE(?1, status),
                 next_hearing = COALESCE(?2, next_hearing),
                 estimated_value = COALESCE(?3, estimated_value)
             WHERE id = ?4 OR case_number = ?4 COLLATE NOCASE",
            params![update.status, update.next_hearing, update.estimated_value, key],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        find_case(&conn, key)
    }

    pub fn attorney(&self, id: &str) -> Result<Option<AttorneyRecord>, StoreError> {
        let conn = self.connect()?;
        find_attorney(&conn, id)
    }

    pub fn attorneys(
        &self,
        specialty: Option<&str>,
        available_only: bool,
    ) -> Result<Vec<AttorneyRecord>, StoreError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ATTORNEY_COLUMNS} FROM attorneys a
             WHERE (?1 IS NULL OR a.specialty LIKE ?1) AND (?2 = 0 OR a.available = 1)
             ORDER BY a.name"
        ))?;
        let rows = stmt.query_map(
            params![specialty.map(like), available_only],
            attorney_from_row,
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Invoices whose client name, invoice name, or number contains `query`.
    pub fn search_invoices(&self, query: &str) -> Result<Vec<InvoiceRecord>, StoreError> {
        let conn = self.connect()?;
        let ids: Vec<String> = {
            let mut stmt = conn.prepare(
                "SELECT id FROM invoices
                 WHERE client_name LIKE ?1 OR invoice_number LIKE ?1 OR invoice_name LIKE ?1
                 ORDER BY date DESC",
            )?;
            let rows = stmt.query_map(params![like(query)], |row| row.get(0))?;
            rows.collect::<Result<_, _>>()?
        };
        let mut invoices = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(invoice) = find_invoice(&conn, &id)? {
                invoices.push(invoice);
            }
        }
        Ok(invoices)
    }

    /// An invoice with its line items, by id or invoice number.
    pub fn invoice(&self, key: &str) -> Result<Option<InvoiceRecord>, StoreError> {
        let conn = self.connect()?;
        find_invoice(&conn, key)
    }

    /// The rate card, most expensive first.
    pub fn rates(&self, service: Option<&str>) -> Result<Vec<LegalRate>, StoreError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT service, rate, unit, description FROM legal_rates
             WHERE (?1 IS NULL OR service LIKE ?1)
             ORDER BY rate DESC",
        )?;
        let rows = stmt.query_map(params![service.map(like)], |row| {
            Ok(LegalRate {
                service: row.get(0)?,
                rate: row.get(1)?,
                unit: row.get(2)?,
                description: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn like(value: &str) -> String {
    format!("%{value}%")
}

fn find_case(conn: &Connection, key: &str) -> Result<Option<CaseRecord>, StoreError> {
    let case = conn
        .query_row(
            &format!(
                "SELECT {CASE_COLUMNS} FROM cases WHERE id = ?1 OR case_number = ?1 COLLATE NOCASE"
            ),
            params![key],
            case_from_row,
        )
        .optional()?;
    let Some(mut case) = case else {
        return Ok(None);
    };
    if let Some(attorney_id) = case.attorney_id.as_deref() {
        case.attorney = find_attorney(conn, attorney_id)?;
    }
    Ok(Some(case))
}

fn find_attorney(conn: &Connection, id: &str) -> Result<Option<AttorneyRecord>, StoreError> {
    Ok(conn
        .query_row(
            &format!("SELECT {ATTORNEY_COLUMNS} FROM attorneys a WHERE a.id = ?1"),
            params![id],
            attorney_from_row,
        )
        .optional()?)
}

fn find_invoice(conn: &Connection, key: &str) -> Result<Option<InvoiceRecord>, StoreError> {
    let invoice = conn
        .query_row(
            &format!(
                "SELECT {INVOICE_COLUMNS} FROM invoices
                 WHERE id = ?1 OR invoice_number = ?1 COLLATE NOCASE"
            ),
            params![key],
            invoice_from_row,
        )
        .optional()?;
    let Some(mut invoice) = invoice else {
        return Ok(None);
    };
    let mut stmt =
        conn.prepare("SELECT description, amount FROM invoice_items WHERE invoice_id = ?1 ORDER BY id")?;
    let items = stmt.query_map(params![invoice.id], |row| {
        Ok(InvoiceItem {
            description: row.get(0)?,
            amount: row.get(1)?,
            ..InvoiceItem::default()
        })
    })?;
    invoice.items = items.collect::<Result<Vec<_>, _>>()?;
    invoice.subtotal = Some(invoice.items.iter().map(|i| i.amount).sum());
    Ok(Some(invoice))
}

fn case_from_row(row: &Row<'_>) -> rusqlite::Result<CaseRecord> {
    Ok(CaseRecord {
        id: row.get(0)?,
        case_number: row.get(1)?,
        title: row.get(2)?,
        case_type: row.get(3)?,
        status: row.get(4)?,
        filed_date: row.get(5)?,
        attorney_id: row.get(6)?,
        client: row.get(7)?,
        next_hearing: row.get(8)?,
        estimated_value: row.get(9)?,
        attorney: None,
    })
}

fn attorney_from_row(row: &Row<'_>) -> rusqlite::Result<AttorneyRecord> {
    Ok(AttorneyRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        specialty: row.get(2)?,
        hourly_rate: row.get(3)?,
        years_experience: row.get(4)?,
        bar_number: row.get(5)?,
        email: row.get(6)?,
        phone: row.get(7)?,
        available: row.get(8)?,
        active_cases: Some(row.get(9)?),
        total_cases: Some(row.get(10)?),
    })
}

fn invoice_from_row(row: &Row<'_>) -> rusqlite::Result<InvoiceRecord> {
    let total: f64 = row.get(7)?;
    let paid: f64 = row.get(8)?;
    Ok(InvoiceRecord {
        id: row.get(0)?,
        invoice_number: row.get(1)?,
        invoice_name: row.get(2)?,
        client_name: row.get(3)?,
        issue_date: row.get(4)?,
        due_date: row.get(5)?,
        status: row.get(6)?,
        total,
        tax: Some(0.0),
        paid_amount: Some(paid),
        balance: Some(total - paid),
        ..InvoiceRecord::default()
    })
}

type AttorneySeed = (
    &'static str,
    &'static str,
    &'static str,
    f64,
    u32,
    &'static str,
    &'static str,
    &'static str,
    bool,
);

const SEED_ATTORNEYS: &[AttorneySeed] = &[
    ("att-001", "Sarah Johnson", "Corporate Law", 500.0, 15, "CA123456", "sarah.johnson@lawfirm.com", "+1-555-0101", true),
    ("att-002", "Michael Chen", "Intellectual Property", 450.0, 12, "CA234567", "michael.chen@lawfirm.com", "+1-555-0102", true),
    ("att-003", "Emily Rodriguez", "Employment Law", 425.0, 10, "CA345678", "emily.rodriguez@lawfirm.com", "+1-555-0103", true),
    ("att-004", "David Kim", "Real Estate", 400.0, 8, "CA456789", "david.kim@lawfirm.com", "+1-555-0104", false),
    ("att-005", "Jessica Williams", "Contract Law", 475.0, 14, "CA567890", "jessica.williams@lawfirm.com", "+1-555-0105", true),
];

type CaseSeed = (
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    Option<&'static str>,
    f64,
);

const SEED_CASES: &[CaseSeed] = &[
    ("case-001", "2025-CV-10001", "Smith v. Jones", "Contract Dispute", "Active", "2025-06-15", "att-001", "John Smith", Some("2026-03-01"), 250_000.0),
    ("case-002", "2025-CV-10002", "ABC Corp v. XYZ Inc", "Intellectual Property", "Active", "2025-08-22", "att-002", "ABC Corporation", Some("2026-02-15"), 500_000.0),
    ("case-003", "2025-CV-10003", "Employee Dispute Matter", "Employment Law", "Closed", "2025-09-10", "att-003", "TechSolutions Inc", None, 75_000.0),
    ("case-004", "2025-RE-10004", "Property Line Dispute", "Real Estate", "Active", "2025-11-05", "att-004", "Global Ventures LLC", Some("2026-04-10"), 150_000.0),
];

type InvoiceSeed = (
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    f64,
    f64,
);

const SEED_INVOICES: &[InvoiceSeed] = &[
    ("inv-001", "INV-2026-001", "Professional Services", "TechSolutions Consulting", "2026-01-15", "2026-02-14", "PAID", 5700.0, 5700.0),
    ("inv-002", "INV-2026-002", "Litigation Support", "ABC Corporation", "2026-01-20", "2026-02-19", "OUTSTANDING", 13_600.0, 0.0),
    ("inv-003", "INV-2026-003", "Contract Services", "TechStart Industries", "2026-02-01", "2026-03-03", "OUTSTANDING", 4300.0, 0.0),
];

const SEED_ITEMS: &[(&str, &str, f64)] = &[
    ("inv-001", "Professional Services Invoice from TechSolutions Consulting", 5700.0),
    ("inv-002", "Legal Consultation", 3400.0),
    ("inv-002", "Document Review", 4800.0),
    ("inv-002", "Court Appearance", 5400.0),
    ("inv-003", "Contract Drafting", 2800.0),
    ("inv-003", "Legal Review", 1500.0),
];

const SEED_RATES: &[(&str, f64, &str)] = &[
    ("Partner Attorney Rate", 500.0, "Senior partner time"),
    ("Senior Attorney Rate", 400.0, "Senior associate time"),
    ("Junior Attorney Rate", 250.0, "Junior associate time"),
    ("Paralegal Rate", 150.0, "Paralegal support"),
    ("Document Review", 200.0, "Document review and analysis"),
    ("Court Appearance", 600.0, "Court appearances and hearings"),
    ("Consultation", 350.0, "Client consultation"),
];

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn seeded() -> (TempDir, LegalStore) {
        let dir = TempDir::new().unwrap();
        let store = LegalStore::open(dir.path().join("data").join("legal.db")).unwrap();
        store.seed().unwrap();
        (dir, store)
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("legal.db");
        let store = LegalStore::open(&path).unwrap();
        assert!(path.exists());
        assert!(store.search_cases(&CaseFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn test_seed_is_idempotent() {
        let (_dir, store) = seeded();
        store.seed().unwrap();
        assert_eq!(store.search_cases(&CaseFilter::default()).unwrap().len(), 4);
        let invoice = store.invoice("INV-2026-002").unwrap().unwrap();
        assert_eq!(invoice.items.len(), 3);
    }

    #[test]
    fn test_search_cases_filters_and_orders() {
        let (_dir, store) = seeded();
        let active = store
            .search_cases(&CaseFilter {
                status: Some("active".into()),
                ..CaseFilter::default()
            })
            .unwrap();
        let numbers: Vec<_> = active.iter().map(|c| c.case_number.as_str()).collect();
        assert_eq!(numbers, vec!["2025-RE-10004", "2025-CV-10002", "2025-CV-10001"]);

        let by_type = store
            .search_cases(&CaseFilter {
                case_type: Some("property".into()),
                attorney_id: Some("att-002".into()),
                ..CaseFilter::default()
            })
            .unwrap();
        assert_eq!(by_type.len(), 1);
        assert_eq!(by_type[0].title, "ABC Corp v. XYZ Inc");
    }

    #[test]
    fn test_case_lookup_by_number_or_id_joins_attorney() {
        let (_dir, store) = seeded();
        let by_number = store.case("2025-CV-10001").unwrap().unwrap();
        let by_id = store.case("case-001").unwrap().unwrap();
        assert_eq!(by_number, by_id);
        let attorney = by_number.attorney.unwrap();
        assert_eq!(attorney.name, "Sarah Johnson");
        assert_eq!(attorney.active_cases, Some(1));
        assert!(store.case("2025-CV-99999").unwrap().is_none());
    }

    #[test]
    fn test_create_case_assigns_number_and_defaults() {
        let (_dir, store) = seeded();
        let new = NewCase {
            title: "Acme v. Widget".into(),
            case_type: "Contract Dispute".into(),
            client: "Acme LLC".into(),
            attorney_id: "att-005".into(),
            estimated_value: Some(42_000.0),
        };
        let first = store.create_case(&new).unwrap();
        let second = store.create_case(&new).unwrap();

        let year = Local::now().year();
        assert!(first.id.starts_with("case-") && first.id.len() == 11);
        assert!(first.case_number.starts_with(&format!("{year}-CV-")));
        assert_ne!(first.case_number, second.case_number);
        assert_eq!(first.status, "New");
        assert_eq!(first.attorney.unwrap().name, "Jessica Williams");
        assert_eq!(first.estimated_value, Some(42_000.0));
    }

    #[test]
    fn test_create_case_rejects_unknown_attorney() {
        let (_dir, store) = seeded();
        let err = store
            .create_case(&NewCase {
                title: "T".into(),
                case_type: "X".into(),
                client: "C".into(),
                attorney_id: "att-999".into(),
                estimated_value: None,
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(ref m) if m == "Attorney att-999 not found"));
    }

    #[test]
    fn test_update_case_changes_only_given_fields() {
        let (_dir, store) = seeded();
        let updated = store
            .update_case(
                "2025-CV-10003",
                &CaseUpdate {
                    status: Some("Appeal".into()),
                    ..CaseUpdate::default()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, "Appeal");
        assert_eq!(updated.estimated_value, Some(75_000.0));
        assert!(
            store
                .update_case("nope", &CaseUpdate { status: Some("x".into()), ..CaseUpdate::default() })
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_attorney_listing() {
        let (_dir, store) = seeded();
        assert_eq!(store.attorneys(None, false).unwrap().len(), 5);
        let available = store.attorneys(None, true).unwrap();
        assert_eq!(available.len(), 4);
        assert!(available.iter().all(|a| a.available));
        let ip = store.attorneys(Some("intellectual"), false).unwrap();
        assert_eq!(ip[0].id, "att-002");
        assert!(store.attorney("att-004").unwrap().is_some_and(|a| !a.available));
    }

    #[test]
    fn test_invoice_search_and_items() {
        let (_dir, store) = seeded();
        let found = store.search_invoices("techstart").unwrap();
        assert_eq!(found.len(), 1);
        let invoice = &found[0];
        assert_eq!(invoice.invoice_number, "INV-2026-003");
        assert_eq!(invoice.total, 4300.0);
        assert_eq!(invoice.balance, Some(4300.0));
        let items: Vec<_> = invoice.items.iter().map(|i| i.description.as_str()).collect();
        assert_eq!(items, vec!["Contract Drafting", "Legal Review"]);

        let paid = store.invoice("inv-001").unwrap().unwrap();
        assert_eq!(paid.balance, Some(0.0));
    }

    #[test]
    fn test_rates_descending() {
        let (_dir, store) = seeded();
        let rates = store.rates(None).unwrap();
        assert_eq!(rates.len(), 7);
        assert_eq!(rates[0].service, "Court Appearance");
        assert!(rates.windows(2).all(|w| w[0].rate >= w[1].rate));
        assert_eq!(store.rates(Some("attorney")).unwrap().len(), 3);
    }
}
