// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

// Reference and variant read priors expected by PhyloWGS, see
// Deshwar et al., Genome Biology 2015, 10.1186/s13059-015-0602-8
pub static MU_R: f64 = 0.999;
pub static MU_V: f64 = 0.499;

// Maximum number of multinomial draws before remaining zero depths
// are floored to one read.
pub static MAX_MULTINOMIAL_ATTEMPTS: usize = 10;

// Header of the copy-number companion file, for pipelines that expect
// a header line instead of an entirely empty file.
pub static CNV_HEADER: &str = "chr\tstart\tend\tmajor_cn\tminor_cn\tcellular_prevalence";
