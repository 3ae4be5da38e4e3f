// Command templates for the external tools.
//
// Placeholders are written `{{name}}` and substituted with `lib_pipeline::statement::render()`;
// values are shell-quoted by the callers.

/// STAR alignment of paired-end reads, converted to BAM and sorted.
pub const STAR_PAIRED: &str = r#"
tmp=`mktemp -p {{tmp_dir}}` &&
STAR
  --runMode alignReads
  --runThreadN {{threads}}
  --genomeDir {{genome_dir}}
  --outSAMstrandField intronMotif
  --outFileNamePrefix {{log_prefix}}
  --outStd SAM
  --outSAMunmapped Within
  --outFilterMismatchNmax 2
  --readFilesIn {{read1}} {{read2}}
  --readFilesCommand zcat | samtools view -b - > $tmp &&
samtools sort -O BAM $tmp > {{outfile}} &&
rm $tmp
"#;

/// STAR alignment of single-end reads.
pub const STAR_SINGLE: &str = r#"
tmp=`mktemp -p {{tmp_dir}}` &&
STAR
  --runMode alignReads
  --runThreadN {{threads}}
  --genomeDir {{genome_dir}}
  --outSAMstrandField intronMotif
  --outFileNamePrefix {{log_prefix}}
  --outStd SAM
  --outSAMunmapped Within
  --outFilterMismatchNmax 2
  --readFilesIn {{infile}}
  --readFilesCommand zcat | samtools view -b - > $tmp &&
samtools sort -O BAM $tmp > {{outfile}} &&
rm $tmp
"#;

pub const SAMTOOLS_INDEX: &str = "samtools index -b {{infile}} {{outfile}}";

/// Re-add sequence qualities stripped by the CGAT mapping pipeline.
pub const BAM2BAM: &str = r#"
cat {{infile}} |
  cgat bam2bam
    -v 5
    --method=set-sequence
    --log={{log}}
    > {{outfile}} &&
samtools index {{outfile}}
"#;

/// Link BAM and index into the filtered BAM directory.
pub const SYMLINK_BAM: &str = r#"
dir=`pwd` &&
ln -sf $dir/{{infile}} {{outfile}} &&
ln -sf $dir/{{in_index}} {{out_index}}
"#;

/// Count reads on exons of the gene set, stripping directory and suffix from the sample
/// columns.
pub const FEATURE_COUNTS: &str = r#"
tmp=`mktemp -p {{tmp_dir}}` &&
gtf=`mktemp -p {{tmp_dir}}` &&
zcat {{geneset}} > $gtf &&
featureCounts
  -T {{threads}}
  -s {{strand}}
  -Q 255
  -t exon
  -g gene_id
  {{pair_opts}}
  -a $gtf
  -o $tmp
  {{bams}} &&
sed 's/bam.dir\///g' $tmp |
sed 's/.bam//g' - > {{outfile}} &&
rm $tmp $gtf
"#;

pub const PICARD_ALIGNMENT_SUMMARY: &str = r##"
tmp=`mktemp -p {{tmp_dir}}` &&
picard -Xmx{{memory}}
  CollectAlignmentSummaryMetrics
    R={{reference}}
    I={{infile}}
    O=$tmp &&
cat $tmp | grep -v "#" > {{outfile}} &&
rm $tmp
"##;

/// Picard RNA-seq metrics, split into the metrics table and the coverage histogram.
pub const PICARD_RNASEQ_METRICS: &str = r##"
picard_out=`mktemp -p {{tmp_dir}}` &&
picard -Xmx{{memory}}
  CollectRnaSeqMetrics
    REF_FLAT={{ref_flat}}
    INPUT={{infile}}
    OUTPUT=$picard_out
    STRAND={{strand}} &&
grep -v "#" $picard_out |
  grep "[a-z,A-Z,0-9]" - | head -n2 > {{table}} &&
grep -v "#" $picard_out |
  sed -n '/normalized_position/,/^[[:blank:]]/p' - > {{hist}} &&
rm $picard_out
"##;

/// Prefix switching the environment module to the configured Salmon version.
pub const SALMON_MODULE: &str = "module switch bio/salmon/0.11.3 bio/salmon/{{version}} &&";

pub const SALMON_PAIRED: &str = r#"
salmon quant
  -i {{index}}
  -p {{threads}}
  -l {{libtype}}
  -1 {{read1}}
  -2 {{read2}}
  -o {{outname}}
  &> {{outfile}}
"#;

pub const SALMON_SINGLE: &str = r#"
salmon quant
  -i {{index}}
  -p {{threads}}
  -l {{libtype}}
  -r {{infile}}
  -o {{outname}}
  &> {{outfile}}
"#;

/// Coverage track from the first mates of paired-end alignments.
pub const BAM_COVERAGE_PAIRED: &str = r#"
bamCoverage -b {{infile}} -o {{outfile}}
  --binSize 5
  --normalizeUsing {{norm_method}}
  --samFlagInclude 64
  --centerReads
  --minMappingQuality 255
  --smoothLength 10
  --skipNAs
  -p "max"
"#;

pub const BAM_COVERAGE_SINGLE: &str = r#"
bamCoverage -b {{infile}} -o {{outfile}}
  --binSize 5
  --normalizeUsing {{norm_method}}
  --minMappingQuality 255
  --smoothLength 10
  --samFlagExclude 4
  --centerReads
  -p "max"
"#;

/// Execute a notebook template and render the result to html.
pub const NBCONVERT: &str = r#"
cp {{template}} . &&
jupyter nbconvert
  --to notebook
  --allow-errors
  --ExecutePreprocessor.timeout=-1
  --execute {{notebook}} &&
jupyter nbconvert
  --to html
  --ExecutePreprocessor.timeout=-1
  --execute {{executed}} &&
rm {{notebook}}
"#;
