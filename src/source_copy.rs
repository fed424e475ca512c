use std::collections::BTreeSet;

use crate::arrow::Build;
use crate::path::Path;
use crate::rule::PreRule;

/*  For every context, synthesises a copy-rule for each source file that
    isn't already a target of some user rule.  Registered with
    allow_override = true so a real generator rule targeting the same
    build-dir path can take over (see DESIGN.md, Open Question 1). */
pub fn bridge_rules<A, MakeCopy>(
    context_build_dir: &str,
    sources: &[Path],
    is_already_target: impl Fn(&Path) -> bool,
    make_copy_action: MakeCopy,
)
-> Vec<PreRule<A>>
where
    MakeCopy: Fn(&Path, &Path) -> Build<A>,
{
    let mut rules = Vec::new();
    for source in sources
    {
        let dest = Path::local(&format!("{}/{}", context_build_dir, source.as_str()));
        if is_already_target(&dest)
        {
            continue;
        }

        let mut targets = BTreeSet::new();
        targets.insert(dest.clone());
        let build = make_copy_action(source, &dest);
        rules.push(PreRule::new(build, targets, false));
    }
    rules
}
