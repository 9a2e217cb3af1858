//! Constant Dockerfile text templates.
//!
//! Every multi-line snippet the generator emits lives here as a `tera`
//! template with named substitution points, so the exact bytes of each block
//! can be audited and tested on their own. Templates carry no trailing
//! newline; the generator joins blocks with `\n`.

use tera::{Context, Tera};

use crate::error::GenerateError;

/// Base image line.
pub const FROM: &str = "FROM {{ image }}";

/// Environment shared by every image.
pub const ENVIRONMENT: &str = "ENV DEBIAN_FRONTEND=noninteractive
ENV PYTHONUNBUFFERED=1
ENV LD_LIBRARY_PATH=$LD_LIBRARY_PATH:/usr/lib/x86_64-linux-gnu";

/// pyenv bootstrap and interpreter install. `version` may be a minor version,
/// in which case the latest patch release is installed.
pub const PYTHON_TOOLCHAIN: &str = r#"RUN ### --> Installing Python prerequisites
ENV PATH="/root/.pyenv/shims:/root/.pyenv/bin:$PATH"
RUN apt-get update -q && apt-get install -qy --no-install-recommends \
	make \
	build-essential \
	libssl-dev \
	zlib1g-dev \
	libbz2-dev \
	libreadline-dev \
	libsqlite3-dev \
	wget \
	curl \
	llvm \
	libncurses5-dev \
	libncursesw5-dev \
	xz-utils \
	tk-dev \
	libffi-dev \
	liblzma-dev \
	python-openssl \
	git \
	ca-certificates \
	&& rm -rf /var/lib/apt/lists/*
RUN ### --> Installing Python {{ version }}
RUN curl https://pyenv.run | bash && \
	git clone https://github.com/momo-lab/pyenv-install-latest.git "$(pyenv root)"/plugins/pyenv-install-latest && \
	pyenv install-latest "{{ version }}" && \
	pyenv global $(pyenv install-latest --print "{{ version }}")"#;

pub const SYSTEM_PACKAGES: &str = "RUN ### --> Installing system packages
RUN apt-get update -qq && apt-get install -qy {{ packages }} && rm -rf /var/lib/apt/lists/*";

pub const PYTHON_REQUIREMENTS: &str = "RUN ### --> Installing Python requirements
COPY {{ requirements }} /tmp/requirements.txt
RUN pip install -r /tmp/requirements.txt && rm /tmp/requirements.txt";

/// `find_links` and `extra_index_urls` are each empty or a run of
/// `<flag> <url> ` items with a trailing space.
pub const PYTHON_PACKAGES: &str = "RUN ### --> Installing Python packages
RUN pip install {{ find_links }} {{ extra_index_urls }} {{ packages }}";

/// Serving dependencies plus the runtime library, decoded from base64 at build time.
pub const RUNTIME_LIBRARY: &str = "RUN ### --> Installing Cog
RUN pip install {{ dependencies }}
ENV PYTHONPATH={{ install_dir }}
RUN mkdir -p {{ install_dir }} && echo {{ library_b64 }} | base64 --decode > {{ install_dir }}/{{ file_name }}";

pub const COPY_CODE: &str = "RUN ### --> Copying code
COPY . {{ code_dir }}";

/// One wrapper script. The `\n` sequences are literal: `echo` in the build
/// shell expands them into the script's line breaks.
pub const SERVER_SCRIPT: &str = r#"RUN echo '#!/usr/bin/env python\nimport sys\nimport cog\nimport os\nos.chdir("{{ code_dir }}")\nsys.path.append("{{ code_dir }}")\n{{ import_line }}\n{{ invocation }}' > {{ path }}
RUN chmod +x {{ path }}"#;

pub const EPILOGUE: &str = "WORKDIR {{ code_dir }}
CMD {{ command }}";

/// Render `template` with `context`, naming `step` in any error.
pub fn render(step: &str, template: &str, context: &Context) -> Result<String, GenerateError> {
    Tera::one_off(template, context, false).map_err(|source| GenerateError::Template {
        step: step.to_string(),
        source,
    })
}
