use anyhow::Result;

use crate::cli::ExportArgs;
use crate::provider::Reconciler;

pub fn run(args: ExportArgs, dry_run: bool) -> Result<()> {
    let resource = args.into_resource();
    let outcome = Reconciler::new(&resource, dry_run).export()?;
    super::report(&resource, &outcome);
    Ok(())
}
