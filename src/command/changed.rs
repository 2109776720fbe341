//! Lists packages changed since a version, tag or commit.
use crate::{
    monorepo::Monorepo, package::filter::Selection, result::Result,
    version::changed::changed_since,
};

pub async fn execute(
    monorepo: &Monorepo,
    selection: &Selection,
    versionish: Option<&str>,
) -> Result<()> {
    for id in changed_ids(monorepo, selection, versionish).await? {
        println!("{id}");
    }

    Ok(())
}

pub async fn changed_ids(
    monorepo: &Monorepo,
    selection: &Selection,
    versionish: Option<&str>,
) -> Result<Vec<String>> {
    let subjects = monorepo.select(selection)?;
    let changed =
        changed_since(monorepo, &subjects, versionish.unwrap_or_default())
            .await?;

    Ok(changed.iter().map(|pkg| pkg.readable_id()).collect())
}
