use crate::infra::{build_notifier, open_repository, ApiService};
use chrono::{Duration, Local};
use clap::Args;
use grant_pipeline::config::{AppConfig, DispatchMode, MailConfig, StorageConfig};
use grant_pipeline::error::AppError;
use grant_pipeline::telemetry;
use grant_pipeline::workflows::grants::{
    Actor, ApplicationDraft, ApplicationPatch, ApplicationStage, ClientDraft, ClientType,
    EligibilityProfile, GrantCatalogImporter, GrantImport, GrantPipelineService, InviteDraft,
    LookupCatalog, MatchDraft, MatchStatus, PipelineConfig, Role, TagCategory, UnresolvedTag,
};
use serde::Serialize;
use std::io::Cursor;
use std::path::PathBuf;

const SAMPLE_CATALOG: &str = "\
Name,Funder,Status,Deadline Type,Deadline,Amount Min,Amount Max,Causes,Applicant Types,\
Provinces,Eligibility Flags
Community Health Fund,Harbour Foundation,open,fixed,2026-03-31,5000,25000,\
Health & Wellness;Seniors,Registered Charity,ON;QC,
Rural Wellness Initiative,Northern Trust,open,rolling,,2500,15000,Health & Wellness,\
Registered Charity;Nonprofit Organization,ON,Rural/Remote
Literacy Builders,Prairie Trust,open,multiple,,1000,10000,Education & Literacy,\
Registered Charity,BC,
Heritage Capital Program,Old Money Fund,closed,,,,,Arts & Culture,,,
";

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Grant catalog CSV to load instead of the built-in sample.
    #[arg(long)]
    pub(crate) catalog: Option<PathBuf>,
    /// Name of the sample client organization.
    #[arg(long, default_value = "Harbour Community Health Centre")]
    pub(crate) client_name: String,
    /// How many suggestions to print.
    #[arg(long, default_value_t = 5)]
    pub(crate) suggestions: usize,
    /// End the walkthrough with a declined decision instead of an award.
    #[arg(long)]
    pub(crate) decline: bool,
}

#[derive(Args, Debug)]
pub(crate) struct ImportArgs {
    /// Funder spreadsheet exported as CSV
    #[arg(long)]
    pub(crate) csv: PathBuf,
    /// SQLite database file; overrides GRANTS_DATABASE_PATH
    #[arg(long)]
    pub(crate) database: Option<PathBuf>,
    /// Parse and report without creating grants
    #[arg(long)]
    pub(crate) dry_run: bool,
}

#[derive(Debug, Serialize)]
struct ImportSummary<'a> {
    parsed: usize,
    created: usize,
    dry_run: bool,
    unresolved: &'a [UnresolvedTag],
}

pub(crate) fn run_import(args: ImportArgs) -> Result<(), AppError> {
    let ImportArgs {
        csv,
        database,
        dry_run,
    } = args;

    let mut config = AppConfig::load()?;
    if let Some(path) = database {
        config.storage.database_path = Some(path);
    }
    telemetry::init(&config.telemetry)?;

    let repository = open_repository(&config.storage)?;
    let lookups = repository.lookups()?;
    let import = GrantCatalogImporter::from_path(&csv, &lookups)?;

    let mut created = 0;
    if !dry_run {
        if config.storage.database_path.is_none() {
            println!("No database configured; grants will not outlive this process.");
        }
        let (notifier, _) = build_notifier(repository.clone(), &config.mail);
        let service: ApiService =
            GrantPipelineService::new(repository, notifier, config.pipeline.clone());
        let importer = Actor::new("cli-import", Role::Admin);
        for draft in import.drafts.iter().cloned() {
            service.create_grant(&importer, draft)?;
            created += 1;
        }
    }

    let summary = ImportSummary {
        parsed: import.drafts.len(),
        created,
        dry_run,
        unresolved: &import.unresolved,
    };
    match serde_json::to_string_pretty(&summary) {
        Ok(json) => println!("{json}"),
        Err(err) => println!("Import summary unavailable: {err}"),
    }
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        catalog,
        client_name,
        suggestions: shown,
        decline,
    } = args;

    let repository = open_repository(&StorageConfig::default())?;
    let mail = MailConfig {
        from_address: "grants@demo.local".to_string(),
        dispatch: DispatchMode::Inline,
        queue_capacity: 1,
        portal_url: "http://localhost:3000".to_string(),
    };
    let (notifier, _) = build_notifier(repository.clone(), &mail);
    let service: ApiService =
        GrantPipelineService::new(repository, notifier, PipelineConfig::default());
    let coordinator = Actor::new("demo-coordinator", Role::Staff);
    let admin = Actor::new("demo-admin", Role::Admin);

    println!("Grant pipeline demo");
    let lookups = service.lookups()?;
    let import = load_catalog(catalog, &lookups)?;
    println!(
        "Catalog: {} grants parsed, {} unknown tags",
        import.drafts.len(),
        import.unresolved.len()
    );
    for tag in &import.unresolved {
        println!(
            "  - line {}: no {} named '{}'",
            tag.line,
            tag.category.label(),
            tag.name
        );
    }
    for draft in import.drafts {
        service.create_grant(&admin, draft)?;
    }

    let client = service.create_client(
        &coordinator,
        ClientDraft {
            name: client_name,
            entity_type: Some("Registered charity".to_string()),
            notes: None,
            client_type: ClientType::Managed,
            eligibility: EligibilityProfile::default()
                .with(TagCategory::Cause, &["health-wellness", "seniors"])
                .with(TagCategory::ApplicantType, &["registered-charity"])
                .with(TagCategory::Province, &["ON"]),
            grant_db_access: true,
        },
    )?;
    println!("\nClient: {} ({})", client.name, client.id);

    let suggestions = service.suggest_matches(&coordinator, &client.id)?;
    if suggestions.is_empty() {
        println!("Suggestions: none");
        return Ok(());
    }
    println!("Suggestions");
    for suggestion in suggestions.iter().take(shown) {
        println!(
            "- {:>3} {:<6} {}",
            suggestion.fit_score,
            suggestion.fit_level.label(),
            suggestion.grant.name
        );
        for issue in &suggestion.reasons.issues {
            println!("        {issue}");
        }
    }

    let best = &suggestions[0];
    let saved = service.create_match(
        &coordinator,
        MatchDraft {
            client_id: client.id.clone(),
            grant_id: best.grant.id.clone(),
            fit_score: best.fit_score,
            reasons: best.reasons.clone(),
            notes: Some("Top suggestion from the demo run".to_string()),
            status: MatchStatus::Qualified,
            owner: None,
        },
    )?;
    println!("\nSaved match {} for {}", saved.id, best.grant.name);

    let invite = service.create_invite(
        &coordinator,
        InviteDraft {
            email: "director@client.example".to_string(),
            name: Some("Executive Director".to_string()),
            client_id: client.id.clone(),
            client_role: Default::default(),
        },
    )?;
    let portal_user = service.accept_invite(&invite.token, None)?;
    println!("Portal user {} joined {}", portal_user.email, client.name);

    let application = service.create_application(
        &coordinator,
        ApplicationDraft {
            client_id: client.id.clone(),
            grant_id: best.grant.id.clone(),
            match_id: Some(saved.id.clone()),
            stage: ApplicationStage::Draft,
            internal_deadline: Some(Local::now().date_naive() + Duration::days(21)),
            amount_requested: best.grant.amount_max,
            assigned_to: Some(coordinator.user_id.clone()),
            cycle_year: None,
            round_label: None,
        },
    )?;

    let decision = if decline {
        ApplicationStage::Declined
    } else {
        ApplicationStage::Awarded
    };
    for stage in [
        ApplicationStage::InProgress,
        ApplicationStage::Submitted,
        decision,
    ] {
        service.update_application(
            &coordinator,
            &application.id,
            ApplicationPatch {
                stage: Some(stage),
                ..ApplicationPatch::default()
            },
        )?;
    }

    println!("\nApplication timeline (newest first)");
    for event in service.list_events(&coordinator, &application.id)? {
        let from = event.from_stage.map_or("-", ApplicationStage::label);
        let to = event.to_stage.map_or("-", ApplicationStage::label);
        println!(
            "- {} {} {} -> {}",
            event.created_at.format("%Y-%m-%d %H:%M:%S"),
            event.event_type.label(),
            from,
            to
        );
    }

    println!("\nPipeline counts");
    for (stage, count) in service.pipeline_counts(&coordinator)?.iter() {
        println!("- {}: {}", stage.title(), count);
    }

    let messages = service.client_messages(&coordinator, &client.id)?;
    if messages.is_empty() {
        println!("\nClient messages: none");
    } else {
        println!("\nClient messages");
        for message in messages {
            let state = if message.delivered { "sent" } else { "failed" };
            println!("- [{state}] {} -> {}", message.subject, message.sent_to);
        }
    }

    Ok(())
}

fn load_catalog(
    catalog: Option<PathBuf>,
    lookups: &LookupCatalog,
) -> Result<GrantImport, AppError> {
    let import = match catalog {
        Some(path) => GrantCatalogImporter::from_path(path, lookups)?,
        None => GrantCatalogImporter::from_reader(Cursor::new(SAMPLE_CATALOG), lookups)?,
    };
    Ok(import)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_catalog_resolves_every_tag() {
        let import = load_catalog(None, &LookupCatalog::standard()).expect("sample parses");
        assert_eq!(import.drafts.len(), 4);
        assert!(import.unresolved.is_empty(), "{:?}", import.unresolved);
    }

    #[test]
    fn demo_runs_end_to_end() {
        run_demo(DemoArgs {
            client_name: "Test Clinic".to_string(),
            suggestions: 3,
            ..DemoArgs::default()
        })
        .expect("demo completes");
    }
}
