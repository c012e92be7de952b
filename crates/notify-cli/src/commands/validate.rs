use anyhow::Result;
use notify_runtime::WorkflowRunner;

/// Loads `playbook` and runs it through the pure ingestion/rule-evaluation
/// half of the pipeline, without ever reaching the dispatcher. Useful for
/// confirming a mapping/ruleset resolve against a workbook before wiring
/// it into a live run.
pub fn validate_playbook(playbook: &str, playbooks_dir: &str, repo_root: &str) -> Result<()> {
    let runner = WorkflowRunner::new(playbooks_dir.to_string(), repo_root.to_string());
    let loaded = runner.load(playbook)?;
    let evaluated = runner.evaluate(&loaded)?;

    println!("playbook={} is_valid=true rows={}", loaded.name, evaluated.len());
    println!("actions={} quiet_hours_configured={}", loaded.actions.len(), loaded.quiet_hours.is_some());

    for (id, _) in evaluated.first().map(|r| r.rule_results.clone()).unwrap_or_default() {
        println!("rule={id}");
    }

    Ok(())
}
