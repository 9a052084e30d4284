use regex::Regex;
use std::{
    collections::{HashMap, HashSet},
    sync::LazyLock,
};

// "_N" occurrence counter at the end of a leaf label
static LABEL_COUNTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([^\s(),:;_])_\d+([:,);])").unwrap());

// --------------------------------------------------
/// Make every FASTA header in an alignment unique. The first occurrence
/// of a label is kept; later ones get `_1`, `_2`, ... in file order,
/// skipping any counter that would collide with an existing label.
/// Sequence lines and line endings are passed through untouched.
pub fn disambiguate_labels(alignment: &str) -> String {
    let taken: HashSet<&str> = alignment
        .lines()
        .filter_map(|line| line.strip_prefix('>'))
        .map(str::trim_end)
        .collect();

    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut renamed: HashSet<String> = HashSet::new();
    let mut output = String::with_capacity(alignment.len());

    for line in alignment.split_inclusive('\n') {
        let Some(header) = line.strip_prefix('>') else {
            output.push_str(line);
            continue;
        };

        let label = header.trim_end();
        let ending = &header[label.len()..];
        let count = seen.entry(label).or_insert(0);

        output.push('>');
        if *count == 0 {
            output.push_str(label);
            *count = 1;
        } else {
            let new_label = loop {
                let candidate = format!("{label}_{count}");
                *count += 1;
                if !taken.contains(candidate.as_str())
                    && !renamed.contains(&candidate)
                {
                    break candidate;
                }
            };
            output.push_str(&new_label);
            renamed.insert(new_label);
        }
        output.push_str(ending);
    }

    output
}

// --------------------------------------------------
/// Remove `_N` occurrence counters from leaf labels in Newick text,
/// e.g., `(Alpha_1:0.1,Beta:0.2);` becomes `(Alpha:0.1,Beta:0.2);`.
pub fn strip_label_counters(tree: &str) -> String {
    LABEL_COUNTER.replace_all(tree, "$1$2").to_string()
}
