use anyhow::Result;
use std::collections::BTreeSet;
use terloc::{
    config::TerlocConfig,
    gaps::checkpoint_summary,
    load::LoadOrchestrator,
    normalize::Domain,
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    // ─── 2) config & orchestrator ────────────────────────────────────
    let config = TerlocConfig::from_env()?;
    let mut orchestrator = LoadOrchestrator::new(config)?;

    // ─── 3) load the active source ───────────────────────────────────
    let loaded = match orchestrator.load() {
        Ok(l) => l,
        Err(e) => {
            error!(source = %e.source_kind(), "load failed: {}", e);
            return Err(e.into());
        }
    };
    if let Some(e) = orchestrator.user_error() {
        error!("uploaded file ignored: {}", e);
    }
    info!(
        source = %loaded.source,
        label = %loaded.label,
        rows = loaded.dataset.num_rows(),
        columns = loaded.dataset.num_columns(),
        freshness = ?loaded.freshness,
        produced_at = %loaded.produced_at,
        "dataset ready"
    );

    // ─── 4) summary ──────────────────────────────────────────────────
    for domain in Domain::ALL {
        let column = match loaded.roles.name_column(domain) {
            Some(c) => c,
            None => {
                warn!(%domain, "no name column found");
                continue;
            }
        };
        let distinct: BTreeSet<String> = match loaded.dataset.column_index(column) {
            Some(j) => loaded
                .dataset
                .column(j)
                .filter_map(|v| v.as_text())
                .collect(),
            None => BTreeSet::new(),
        };
        let report = loaded.report.domain(domain);
        info!(
            %domain,
            column,
            distinct = distinct.len(),
            unmapped = report.fallthrough_total(),
            "clients"
        );
        for (name, count) in &report.fallthrough {
            info!(%domain, name = %name, count, "unmapped name");
        }
    }

    for gap in checkpoint_summary(&loaded.dataset, &loaded.roles) {
        match gap.stats {
            Some(s) => info!(
                from = %gap.from,
                to = %gap.to,
                samples = s.samples,
                mean = %s.mean_hms(),
                "checkpoint gap"
            ),
            None => info!(from = %gap.from, to = %gap.to, "checkpoint gap: no data"),
        }
    }

    info!("done");
    Ok(())
}
