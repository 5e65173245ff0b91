use crate::flags::XtaskCmd;
use xshell::{cmd, Shell};

mod flags;

fn main() -> anyhow::Result<()> {
    let flags = flags::Xtask::from_env()?;
    let sh = Shell::new()?;
    match flags.subcommand {
        XtaskCmd::Test(_) => {
            cmd!(sh, "cargo test --workspace").run()?;
            cmd!(sh, "cargo test -p meetup_model --features miette").run()?;
        }
        XtaskCmd::Demo(_) => {
            let dir = sh.create_temp_dir()?;
            let store = dir.path().join("meetup.json");
            cmd!(sh, "cargo run -p meetup -- --store {store} --allow-storage seed").run()?;
            cmd!(sh, "cargo run -p meetup -- --store {store} --allow-storage list").run()?;
        }
        XtaskCmd::Watch(_) => {
            cmd!(sh, "cargo watch -x test").run()?;
        }
        XtaskCmd::Fix(_) => {
            cmd!(sh, "cargo fmt --all").run()?;
            cmd!(sh, "cargo clippy --fix --allow-dirty --allow-staged").run()?;
            cmd!(sh, "cargo sort -w").run()?;
            cmd!(sh, "cargo-machete --fix --skip-target-dir").run()?;
        }
    }

    Ok(())
}
