use crate::{
    catalog::GenomeLookup, error::UnknownSequenceError, families::Family,
    open_for_write,
};
use anyhow::Result;
use log::debug;
use std::{
    io::Write,
    path::{Path, PathBuf},
};

// --------------------------------------------------
/// Write one `>{label}\n{sequence}` record per member to
/// `{outdir}/{cluster_id}.fasta`. Orthologs are labeled by genome ID,
/// paralogs by genome display name, which may repeat within a file.
pub fn write_family(
    family: &Family,
    catalog: &impl GenomeLookup,
    outdir: &Path,
) -> Result<PathBuf> {
    let records = family
        .sequence_ids()
        .into_iter()
        .map(|sequence_id| {
            catalog.lookup(sequence_id).ok_or_else(|| UnknownSequenceError {
                cluster_id: family.cluster_id().to_string(),
                sequence_id: sequence_id.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let outfile = outdir.join(format!("{}.fasta", family.cluster_id()));
    let mut output = open_for_write(&outfile)?;
    for rec in records {
        let label = match family {
            Family::Ortholog(_) => &rec.genome_id,
            Family::Paralog(_) => &rec.genome_name,
        };
        writeln!(output, ">{label}\n{}", rec.sequence)?;
    }
    output.flush()?;

    debug!(r#"Wrote "{}""#, outfile.display());
    Ok(outfile)
}

// --------------------------------------------------
pub fn manifest_line(family: &Family) -> String {
    let members: String = family
        .sequence_ids()
        .iter()
        .map(|id| format!("{id} "))
        .collect();
    format!("{}:{members}", family.cluster_id())
}

// --------------------------------------------------
/// One `{cluster_id}:{id} {id} ` line per family
pub fn write_manifest<'a>(
    families: impl IntoIterator<Item = &'a Family>,
    outfile: &Path,
) -> Result<usize> {
    let mut output = open_for_write(outfile)?;
    let mut count = 0;
    for family in families {
        writeln!(output, "{}", manifest_line(family))?;
        count += 1;
    }
    output.flush()?;
    Ok(count)
}
