use crate::{
    command::common::describe_packages, monorepo::Monorepo,
    package::filter::Selection, result::Result,
};

pub fn execute(monorepo: &Monorepo, selection: &Selection) -> Result<()> {
    let pkgs = monorepo.select(selection)?;

    for line in describe_packages(&pkgs) {
        println!("{line}");
    }

    Ok(())
}
