use ::duckdb::Connection;

struct Migration {
    version: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0001_reference_tables",
        sql: r#"
CREATE TABLE IF NOT EXISTS securities (
    code TEXT PRIMARY KEY,
    symbol TEXT,
    name TEXT NOT NULL,
    area TEXT,
    industry TEXT,
    market TEXT,
    list_status TEXT,
    list_date TEXT,
    delist_date TEXT
);

CREATE TABLE IF NOT EXISTS trade_calendar (
    exchange TEXT NOT NULL,
    cal_date TEXT NOT NULL,
    is_open BIGINT NOT NULL,
    PRIMARY KEY(exchange, cal_date)
);
"#,
    },
    Migration {
        version: "0002_market_tables",
        sql: r#"
CREATE TABLE IF NOT EXISTS daily_trading (
    code TEXT NOT NULL,
    trade_date TEXT NOT NULL,
    open DOUBLE NOT NULL,
    high DOUBLE NOT NULL,
    low DOUBLE NOT NULL,
    close DOUBLE NOT NULL,
    pre_close DOUBLE,
    pct_change DOUBLE,
    volume DOUBLE NOT NULL,
    amount DOUBLE NOT NULL,
    turnover_rate DOUBLE,
    volume_ratio DOUBLE,
    adj_factor DOUBLE,
    PRIMARY KEY(code, trade_date)
);

CREATE TABLE IF NOT EXISTS name_history (
    code TEXT NOT NULL,
    name TEXT NOT NULL,
    start_date TEXT NOT NULL,
    end_date TEXT,
    ann_date TEXT,
    change_reason TEXT,
    PRIMARY KEY(code, start_date)
);

CREATE TABLE IF NOT EXISTS daily_basic (
    code TEXT NOT NULL,
    trade_date TEXT NOT NULL,
    close DOUBLE,
    turnover_rate DOUBLE,
    volume_ratio DOUBLE,
    pe DOUBLE,
    pb DOUBLE,
    total_share DOUBLE,
    float_share DOUBLE,
    total_mv DOUBLE,
    circ_mv DOUBLE,
    PRIMARY KEY(code, trade_date)
);

CREATE TABLE IF NOT EXISTS index_daily (
    code TEXT NOT NULL,
    trade_date TEXT NOT NULL,
    total_mv DOUBLE,
    float_mv DOUBLE,
    total_share DOUBLE,
    float_share DOUBLE,
    turnover_rate DOUBLE,
    pe DOUBLE,
    pb DOUBLE,
    PRIMARY KEY(code, trade_date)
);
"#,
    },
    Migration {
        version: "0003_statement_tables",
        sql: r#"
CREATE TABLE IF NOT EXISTS balance_sheet (
    code TEXT NOT NULL,
    end_date TEXT NOT NULL,
    ann_date TEXT,
    report_type TEXT,
    total_assets DOUBLE,
    total_liab DOUBLE,
    total_equity_exc_min DOUBLE,
    PRIMARY KEY(code, end_date)
);

CREATE TABLE IF NOT EXISTS income (
    code TEXT NOT NULL,
    end_date TEXT NOT NULL,
    ann_date TEXT,
    total_revenue DOUBLE,
    revenue DOUBLE,
    operate_profit DOUBLE,
    n_income DOUBLE,
    n_income_attr_p DOUBLE,
    PRIMARY KEY(code, end_date)
);

CREATE TABLE IF NOT EXISTS cash_flow (
    code TEXT NOT NULL,
    end_date TEXT NOT NULL,
    ann_date TEXT,
    n_cashflow_act DOUBLE,
    n_cashflow_inv_act DOUBLE,
    n_cash_flows_fnc_act DOUBLE,
    free_cashflow DOUBLE,
    PRIMARY KEY(code, end_date)
);

CREATE TABLE IF NOT EXISTS fin_indicator (
    code TEXT NOT NULL,
    end_date TEXT NOT NULL,
    ann_date TEXT,
    eps DOUBLE,
    bps DOUBLE,
    roe DOUBLE,
    roa DOUBLE,
    debt_to_assets DOUBLE,
    grossprofit_margin DOUBLE,
    PRIMARY KEY(code, end_date)
);
"#,
    },
    Migration {
        version: "0004_ingest_log",
        sql: r#"
CREATE TABLE IF NOT EXISTS ingest_log (
    request_id TEXT NOT NULL,
    code TEXT,
    dataset TEXT NOT NULL,
    status TEXT NOT NULL,
    row_count BIGINT NOT NULL,
    latency_ms BIGINT,
    timestamp TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_ingest_log_dataset_ts ON ingest_log(dataset, timestamp);
CREATE INDEX IF NOT EXISTS idx_daily_trading_date ON daily_trading(trade_date);
CREATE INDEX IF NOT EXISTS idx_daily_basic_date ON daily_basic(trade_date);
"#,
    },
];

pub fn apply_migrations(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    )?;

    for migration in MIGRATIONS {
        let applied_count: i64 = connection.query_row(
            "SELECT COUNT(*) FROM schema_migrations WHERE version = ?",
            [migration.version],
            |row| row.get(0),
        )?;

        if applied_count == 0 {
            connection.execute_batch(migration.sql)?;
            connection.execute(
                "INSERT INTO schema_migrations (version) VALUES (?)",
                [migration.version],
            )?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_apply_once() {
        let connection = Connection::open_in_memory().expect("in-memory db");
        apply_migrations(&connection).expect("first run");
        apply_migrations(&connection).expect("second run");

        let applied: i64 = connection
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .expect("count");
        assert_eq!(applied, MIGRATIONS.len() as i64);
    }
}
