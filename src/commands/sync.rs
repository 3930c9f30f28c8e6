use anyhow::Result;

use crate::cli::CheckoutArgs;
use crate::provider::Reconciler;

pub fn run(args: CheckoutArgs, dry_run: bool) -> Result<()> {
    let resource = args.into_resource();
    let outcome = Reconciler::new(&resource, dry_run).sync()?;
    super::report(&resource, &outcome);
    Ok(())
}
